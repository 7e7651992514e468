#![warn(
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented
)]
#![allow(
    clippy::needless_continue,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::struct_field_names,
    clippy::module_name_repetitions
)]

pub mod annotations;
pub mod appgw;
pub mod brownfield;
pub mod builder;
pub mod config;
pub mod events;
pub mod instrumentation;
pub mod kubernetes;
pub mod net;

pub use builder::{BuildContext, BuildError, build};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use unicase::UniCase;

/// A string that compares, orders and hashes without regard to ASCII case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CaseInsensitiveString(UniCase<String>);

impl CaseInsensitiveString {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(UniCase::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for CaseInsensitiveString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for CaseInsensitiveString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Serialize for CaseInsensitiveString {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CaseInsensitiveString {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertables::assert_ok;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_case_insensitive_string_equality() {
        let host1 = CaseInsensitiveString::new("Foo.Baz");
        let host2 = CaseInsensitiveString::new("foo.baz");

        assert_eq!(host1, host2);
        assert_eq!(host1.as_str(), "Foo.Baz");
    }

    #[test]
    fn test_case_insensitive_string_ordering_collapses_case() {
        let set: BTreeSet<_> = ["WWW.contoso.com", "www.CONTOSO.com", "api.contoso.com"]
            .into_iter()
            .map(CaseInsensitiveString::new)
            .collect();

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_serialization() {
        let host = CaseInsensitiveString::new("Bye.Com");
        let serialized = assert_ok!(serde_json::to_string(&host));
        assert_eq!(serialized, "\"Bye.Com\"");

        let deserialized: CaseInsensitiveString = assert_ok!(serde_json::from_str(&serialized));
        assert_eq!(host, deserialized);
    }

    proptest! {
        #[test]
        fn test_case_insensitive_string_properties(s in "[a-zA-Z0-9.-]{1,16}") {
            let lower = CaseInsensitiveString::new(s.to_lowercase());
            let upper = CaseInsensitiveString::new(s.to_uppercase());

            prop_assert_eq!(lower.cmp(&upper), std::cmp::Ordering::Equal);
            prop_assert_eq!(CaseInsensitiveString::new(&s).to_string(), s);
        }
    }
}
