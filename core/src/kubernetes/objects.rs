use getset::Getters;
use kube::Resource;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Write};
use thiserror::Error;
use typed_builder::TypedBuilder;

/// Namespace and name of a namespaced object.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Getters,
    TypedBuilder,
    Serialize,
    Deserialize,
)]
pub struct ObjectKey {
    #[getset(get = "pub")]
    #[builder(setter(into))]
    namespace: String,

    #[getset(get = "pub")]
    #[builder(setter(into))]
    name: String,
}

pub type ServiceId = ObjectKey;
pub type SecretId = ObjectKey;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObjectKeyError {
    #[error("Object is missing a name")]
    MissingName,
    #[error("Object {0} is missing a namespace")]
    MissingNamespace(String),
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.namespace)?;
        f.write_char('/')?;
        f.write_str(&self.name)
    }
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn for_object<K: Resource>(object: &K) -> Result<Self, ObjectKeyError> {
        let meta = object.meta();
        let name = meta.name.as_deref().ok_or(ObjectKeyError::MissingName)?;
        let namespace = meta
            .namespace
            .as_deref()
            .ok_or_else(|| ObjectKeyError::MissingNamespace(name.to_string()))?;

        Ok(Self::new(namespace, name))
    }

    /// A sibling object in the same namespace.
    pub fn sibling(&self, name: impl Into<String>) -> Self {
        Self::new(self.namespace.clone(), name)
    }

    /// `<namespace>-<name>`, the form used inside generated resource names.
    pub fn full_name(&self) -> String {
        format!("{}-{}", self.namespace, self.name)
    }
}
