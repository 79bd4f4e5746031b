//! Events emitted for notification collaborators.

use serde::{Deserialize, Serialize};

use crate::id::{AssignmentId, CourseId, SubmissionId, UserId};
use crate::Time;

/// Something that happened in the assessment lifecycle that an outside
/// collaborator (mailer, notifier) may want to act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LearningEvent {
    /// First submission for an assignment
    SubmissionCreated {
        /// Submission
        submission_id: SubmissionId,
        /// Assignment
        assignment_id: AssignmentId,
        /// Course of the assignment
        course_id: CourseId,
        /// Learner
        user_id: UserId,
        /// When
        at: Time,
    },
    /// Learner replaced the answers of an existing submission
    SubmissionUpdated {
        /// Submission
        submission_id: SubmissionId,
        /// Assignment
        assignment_id: AssignmentId,
        /// Course of the assignment
        course_id: CourseId,
        /// Learner
        user_id: UserId,
        /// When
        at: Time,
    },
    /// Tutor graded (or re-graded) a submission
    SubmissionGraded {
        /// Submission
        submission_id: SubmissionId,
        /// Learner who owns the submission
        user_id: UserId,
        /// Tutor
        graded_by: UserId,
        /// Awarded score
        score: Option<u32>,
        /// When
        at: Time,
    },
}

impl LearningEvent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            LearningEvent::SubmissionCreated { .. } => "submission_created",
            LearningEvent::SubmissionUpdated { .. } => "submission_updated",
            LearningEvent::SubmissionGraded { .. } => "submission_graded",
        }
    }

    /// Submission the event is about.
    pub fn submission_id(&self) -> SubmissionId {
        match self {
            LearningEvent::SubmissionCreated { submission_id, .. }
            | LearningEvent::SubmissionUpdated { submission_id, .. }
            | LearningEvent::SubmissionGraded { submission_id, .. } => *submission_id,
        }
    }
}
