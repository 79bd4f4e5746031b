//! Assignment submission and grading for coursetrack.
//!
//! This crate implements the submission lifecycle: learners submit (and
//! resubmit) answers, tutors grade them, and every read derives the
//! submission status from the stored submission and the clock.

#![warn(missing_docs)]

pub mod events;
pub mod manager;
pub mod status;
pub mod validation;

pub use events::{EventSink, RecordingEventSink, TracingEventSink};
pub use manager::{
    AssessmentConfig, AssignmentView, BasicSubmissionManager, ReviewItem, SubmissionManager,
    DEFAULT_CLOSING_SOON_HOURS,
};
pub use status::{derive_status, is_closing_soon};
pub use validation::{checked_score, validate_answers, validate_grade};
