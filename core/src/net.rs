use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// A TCP port in `1..=65535`.
#[derive(
    Validate,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(transparent)]
pub struct Port(
    #[validate(minimum = 1)]
    #[validate(maximum = 65535)]
    u16,
);

pub const HTTP_PORT: Port = Port(80);
pub const HTTPS_PORT: Port = Port(443);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0} is not a valid port number")]
pub struct InvalidPortError(String);

impl Port {
    pub const fn new(port: u16) -> Self {
        Self(port)
    }

    pub const fn value(self) -> u16 {
        self.0
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

impl TryFrom<i32> for Port {
    type Error = InvalidPortError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match u16::try_from(value) {
            Ok(port) if port > 0 => Ok(Self(port)),
            _ => Err(InvalidPortError(value.to_string())),
        }
    }
}

impl Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Port {
    type Err = InvalidPortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<u16>() {
            Ok(port) if port > 0 => Ok(Self(port)),
            _ => Err(InvalidPortError(s.to_string())),
        }
    }
}
