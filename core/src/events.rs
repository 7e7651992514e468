//! Non-fatal findings of a build, reported against the object that caused them.

use crate::kubernetes::ObjectKey;
use getset::{CopyGetters, Getters};
use serde::Serialize;
use std::cell::RefCell;
use strum::{Display, IntoStaticStr};
use tracing::debug;
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum EventType {
    Normal,
    Warning,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display, IntoStaticStr,
)]
pub enum EventReason {
    BackendPortTargetMatch,
    FrontendIpConflict,
    InvalidAnnotation,
    LoadDistributionPolicyNotFound,
    RewriteRuleSetNotFound,
    ServiceNotFound,
    SslCertificateNotFound,
    TrustedRootCertificateNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters, CopyGetters, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[getset(get = "pub")]
    object: ObjectKey,

    #[getset(get_copy = "pub")]
    #[builder(default = EventType::Warning)]
    event_type: EventType,

    #[getset(get_copy = "pub")]
    reason: EventReason,

    #[getset(get = "pub")]
    #[builder(setter(into))]
    message: String,
}

#[cfg_attr(test, mockall::automock)]
pub trait EventRecorder {
    fn record(&self, event: Event);
}

/// Keeps every recorded event in order, for the caller to publish once the build returns.
#[derive(Debug, Default)]
pub struct RecordedEvents {
    events: RefCell<Vec<Event>>,
}

impl RecordedEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events.into_inner()
    }
}

impl EventRecorder for RecordedEvents {
    fn record(&self, event: Event) {
        debug!(
            "Recorded {} event {} on {}: {}",
            event.event_type, event.reason, event.object, event.message
        );
        self.events.borrow_mut().push(event);
    }
}
