use serde::Serialize;

use crate::models::ServiceRecord;

use super::{progress::ServiceProgress, state::SessionSnapshot};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum TrackerEvent {
    SessionStateChanged(SessionSnapshot),
    RecordCreated(ServiceRecord),
    ProgressChanged(ServiceProgress),
}

impl TrackerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TrackerEvent::SessionStateChanged(_) => "session-state-changed",
            TrackerEvent::RecordCreated(_) => "record-created",
            TrackerEvent::ProgressChanged(_) => "progress-changed",
        }
    }
}

/// Receives tracker events. Called after the tracker has released its state,
/// so a sink may call back into the tracker.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &TrackerEvent);
}

impl<F> EventSink for F
where
    F: Fn(&TrackerEvent) + Send + Sync,
{
    fn emit(&self, event: &TrackerEvent) {
        self(event)
    }
}
