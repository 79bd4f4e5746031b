//! Outbound notification seam.

use std::sync::Mutex;

use coursetrack_core::LearningEvent;
use tracing::info;

/// Receives lifecycle events after the corresponding write has committed.
///
/// Implementations must not fail the operation that produced the event.
pub trait EventSink: Send + Sync {
    /// Deliver one event.
    fn publish(&self, event: &LearningEvent);
}

/// Default sink: writes each event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: &LearningEvent) {
        match event {
            LearningEvent::SubmissionCreated { submission_id, course_id, user_id, .. }
            | LearningEvent::SubmissionUpdated { submission_id, course_id, user_id, .. } => {
                info!(event = event.name(), %submission_id, %course_id, %user_id, "learning event");
            }
            LearningEvent::SubmissionGraded { submission_id, user_id, graded_by, score, .. } => {
                info!(
                    event = event.name(),
                    %submission_id,
                    %user_id,
                    %graded_by,
                    score = ?score,
                    "learning event"
                );
            }
        }
    }
}

/// Keeps every event in memory, in publish order.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<LearningEvent>>,
}

impl RecordingEventSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events published so far.
    pub fn events(&self) -> Vec<LearningEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for RecordingEventSink {
    fn publish(&self, event: &LearningEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
