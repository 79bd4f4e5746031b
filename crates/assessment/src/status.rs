//! Submission status derivation.
//!
//! Status is never stored. It is recomputed from the submission (if any),
//! the assignment's due date and the caller-supplied `now` on every read,
//! so the same data legitimately reads differently as time passes.

use chrono::Duration;
use coursetrack_core::{Submission, SubmissionStatus, Time};

/// Derive the status of one learner's assignment.
///
/// - graded submission ⇒ `Graded`
/// - ungraded submission ⇒ `Submitted`
/// - no submission, due date strictly before `now` ⇒ `Overdue`
/// - no submission otherwise ⇒ `Pending`
pub fn derive_status(
    submission: Option<&Submission>,
    due_date: Option<Time>,
    now: Time,
) -> SubmissionStatus {
    match submission {
        Some(s) if s.graded_at.is_some() => SubmissionStatus::Graded,
        Some(_) => SubmissionStatus::Submitted,
        None => match due_date {
            Some(due) if due < now => SubmissionStatus::Overdue,
            _ => SubmissionStatus::Pending,
        },
    }
}

/// Whether a pending assignment is due within `window` from `now`.
pub fn is_closing_soon(
    status: SubmissionStatus,
    due_date: Option<Time>,
    now: Time,
    window: Duration,
) -> bool {
    match (status, due_date) {
        (SubmissionStatus::Pending, Some(due)) => due >= now && due - now <= window,
        _ => false,
    }
}
