use crate::appgw::ApplicationGateway;
use crate::config::CompilerConfiguration;
use crate::events::EventRecorder;
use crate::kubernetes::Snapshot;
use chrono::{DateTime, Utc};
use typed_builder::TypedBuilder;

/// Source of the timestamp stamped into the gateway tags.
#[cfg_attr(test, mockall::automock)]
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(now)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Inputs of one build.
#[derive(TypedBuilder)]
pub struct BuildContext<'a> {
    configuration: &'a CompilerConfiguration,
    snapshot: &'a dyn Snapshot,
    /// The gateway as currently deployed; brownfield merges and carried-over resources come from here.
    existing: &'a ApplicationGateway,
    clock: &'a dyn Clock,
    recorder: &'a dyn EventRecorder,
}

impl<'a> BuildContext<'a> {
    pub fn configuration(&self) -> &'a CompilerConfiguration {
        self.configuration
    }

    pub fn snapshot(&self) -> &'a dyn Snapshot {
        self.snapshot
    }

    pub fn existing(&self) -> &'a ApplicationGateway {
        self.existing
    }

    pub fn clock(&self) -> &'a dyn Clock {
        self.clock
    }

    pub fn recorder(&self) -> &'a dyn EventRecorder {
        self.recorder
    }
}
