use crate::CaseInsensitiveString;
use crate::kubernetes::Snapshot;
use agic_api::v1::TargetSpec;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use tracing::debug;

/// A host, port and optional path that traffic on the gateway is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Target {
    host: CaseInsensitiveString,
    /// `0` stands for any port.
    port: i32,
    path: Option<TargetPath>,
}

/// A URL path, compared without regard to ASCII case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TargetPath(String);

impl TargetPath {
    pub fn new(path: &str) -> Self {
        Self(path.trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `/x/*` covers `/x`, `/x/`, `/x/*` and everything below `/x/`; `/*` covers every path.
    pub fn covers(&self, other: &TargetPath) -> bool {
        if matches!(self.0.as_str(), "/*" | "*" | "") {
            return true;
        }

        let other = normalize(&other.0);
        match self.0.strip_suffix("/*") {
            Some(prefix) => {
                let prefix = normalize(prefix);
                other == prefix || other.starts_with(&format!("{prefix}/"))
            }
            None => normalize(&self.0) == other,
        }
    }
}

/// Trailing wildcards and slashes do not change which resource a path lands on.
fn normalize(path: &str) -> &str {
    path.trim_end_matches(['*', '/'])
}

impl Target {
    pub fn new(host: &str, port: i32, path: Option<&str>) -> Self {
        Self {
            host: CaseInsensitiveString::new(host.trim()),
            port,
            path: path.map(TargetPath::new),
        }
    }

    pub fn host(&self) -> &str {
        self.host.as_str()
    }

    pub fn port(&self) -> i32 {
        self.port
    }

    pub fn path(&self) -> Option<&TargetPath> {
        self.path.as_ref()
    }

    /// Expands a target custom resource into one target per path, or a single path-less target.
    pub fn from_spec(spec: &TargetSpec) -> Vec<Target> {
        let host = spec.hostname.as_deref().unwrap_or_default();
        let port = spec.port.unwrap_or_default();
        if spec.paths.is_empty() {
            vec![Target::new(host, port, None)]
        } else {
            spec.paths
                .iter()
                .map(|path| Target::new(host, port, Some(path)))
                .collect()
        }
    }

    /// Whether traffic for `other` falls within this target.
    ///
    /// A target with neither host nor path matches everything. Otherwise hosts must be equal,
    /// port `0` matches every port and a missing path matches every path. A target without a
    /// path of its own, such as a listener, is covered by any target naming its host.
    pub fn covers(&self, other: &Target) -> bool {
        let host_matches =
            (self.host.is_empty() && self.path.is_none()) || self.host == other.host;
        let port_matches = self.port == 0 || other.port == 0 || self.port == other.port;
        let path_matches = match (&self.path, &other.path) {
            (None, _) | (_, None) => true,
            (Some(path), Some(other_path)) => path.covers(other_path),
        };

        host_matches && port_matches && path_matches
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let host = if self.host.is_empty() {
            "*"
        } else {
            self.host.as_str()
        };
        write!(f, "{host}:{}", self.port)?;
        if let Some(path) = &self.path {
            write!(f, "{}", path.as_str())?;
        }
        Ok(())
    }
}

/// Which part of a shared gateway the compiler must leave alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TargetPolicy {
    /// The compiler owns the whole gateway.
    #[default]
    Unrestricted,
    /// Everything covered by these targets belongs to someone else.
    Prohibit(Vec<Target>),
    /// Only what these targets cover belongs to the compiler.
    Manage(Vec<Target>),
}

impl TargetPolicy {
    /// Prohibited targets take precedence; managed targets only apply when none are prohibited.
    pub fn from_snapshot(snapshot: &dyn Snapshot) -> Self {
        let prohibited: Vec<Target> = snapshot
            .prohibited_targets()
            .into_iter()
            .flat_map(|target| Target::from_spec(&target.spec.target))
            .collect();
        if !prohibited.is_empty() {
            debug!("Prohibited targets: {}", join(&prohibited));
            return Self::Prohibit(prohibited);
        }

        let managed: Vec<Target> = snapshot
            .managed_targets()
            .into_iter()
            .flat_map(|target| Target::from_spec(&target.spec.target))
            .collect();
        if !managed.is_empty() {
            debug!("Managed targets: {}", join(&managed));
            return Self::Manage(managed);
        }

        Self::Unrestricted
    }

    /// Whether an existing resource serving `target` must be carried over untouched.
    pub fn is_retained(&self, target: &Target) -> bool {
        match self {
            Self::Unrestricted => false,
            Self::Prohibit(prohibited) => prohibited.iter().any(|p| p.covers(target)),
            Self::Manage(managed) => !managed.iter().any(|m| m.covers(target)),
        }
    }
}

fn join(targets: &[Target]) -> String {
    targets
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
