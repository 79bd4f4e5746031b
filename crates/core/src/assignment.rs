//! Assignments, submissions and the derived submission status.

use serde::{Deserialize, Serialize};

use crate::id::{AssignmentId, CourseId, LessonId, SubmissionId, UserId};
use crate::Time;

/// An assignment attached to a course (and optionally to one of its lessons).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Unique identifier
    pub id: AssignmentId,

    /// Owning course
    pub course_id: CourseId,

    /// Lesson the assignment belongs to, if any
    #[serde(default)]
    pub lesson_id: Option<LessonId>,

    /// Title
    pub title: String,

    /// What shape of answers is expected
    pub kind: AssignmentKind,

    /// Deadline
    #[serde(default)]
    pub due_date: Option<Time>,

    /// Highest score a tutor may award
    pub max_score: u32,

    /// Accepted file extensions for uploads (lowercase, without dot).
    /// Empty means any format.
    #[serde(default)]
    pub accepted_formats: Vec<String>,
}

impl Assignment {
    /// Create an assignment with no deadline and no format restriction.
    pub fn new(
        course_id: CourseId,
        title: impl Into<String>,
        kind: AssignmentKind,
        max_score: u32,
    ) -> Self {
        Self {
            id: AssignmentId::new(),
            course_id,
            lesson_id: None,
            title: title.into(),
            kind,
            due_date: None,
            max_score,
            accepted_formats: Vec::new(),
        }
    }

    /// Builder-style helper to set the deadline.
    pub fn due(mut self, due_date: Time) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Builder-style helper to restrict upload formats.
    pub fn accepting<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_formats = formats
            .into_iter()
            .map(|f| f.into().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }
}

/// Assignment types. Each one fixes the shape of [`Answers`] it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentKind {
    /// Free text, optionally with an attached document
    Essay,
    /// Ordered list of answers
    Quiz,
    /// Uploaded code and/or notes
    Coding,
}

impl AssignmentKind {
    /// Lower-case name, as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentKind::Essay => "essay",
            AssignmentKind::Quiz => "quiz",
            AssignmentKind::Coding => "coding",
        }
    }
}

impl std::fmt::Display for AssignmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A learner's answers, discriminated by assignment kind.
///
/// Persisted as a JSON object with a `type` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Answers {
    /// Essay answer
    Essay {
        /// Essay body
        #[serde(default)]
        text: String,
        /// Uploaded document
        #[serde(default)]
        file_url: Option<String>,
    },
    /// Quiz answers in question order
    Quiz {
        /// One entry per question
        answers: Vec<String>,
    },
    /// Coding submission
    Coding {
        /// Uploaded archive or source file
        #[serde(default)]
        file_url: Option<String>,
        /// Notes for the tutor
        #[serde(default)]
        notes: Option<String>,
    },
}

impl Answers {
    /// Kind of assignment this payload answers.
    pub fn kind(&self) -> AssignmentKind {
        match self {
            Answers::Essay { .. } => AssignmentKind::Essay,
            Answers::Quiz { .. } => AssignmentKind::Quiz,
            Answers::Coding { .. } => AssignmentKind::Coding,
        }
    }

    /// Uploaded file URL, if the payload carries one.
    pub fn file_url(&self) -> Option<&str> {
        match self {
            Answers::Essay { file_url, .. } | Answers::Coding { file_url, .. } => {
                file_url.as_deref()
            }
            Answers::Quiz { .. } => None,
        }
    }
}

/// A learner's submission for an assignment. Unique per (user, assignment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Unique identifier
    pub id: SubmissionId,

    /// Assignment
    pub assignment_id: AssignmentId,

    /// Learner
    pub user_id: UserId,

    /// Latest answers
    pub answers: Answers,

    /// Awarded score
    #[serde(default)]
    pub score: Option<u32>,

    /// Tutor feedback
    #[serde(default)]
    pub feedback: Option<String>,

    /// Time of the latest (re)submission
    pub submitted_at: Time,

    /// Time of the latest grading. Its presence alone makes a submission graded.
    #[serde(default)]
    pub graded_at: Option<Time>,

    /// Tutor who graded last
    #[serde(default)]
    pub graded_by: Option<UserId>,
}

impl Submission {
    /// First submission for an assignment.
    pub fn new(assignment_id: AssignmentId, user_id: UserId, answers: Answers, now: Time) -> Self {
        Self {
            id: SubmissionId::new(),
            assignment_id,
            user_id,
            answers,
            score: None,
            feedback: None,
            submitted_at: now,
            graded_at: None,
            graded_by: None,
        }
    }

    /// Replace the answers. Grading fields are kept as they are.
    pub fn resubmit(&mut self, answers: Answers, now: Time) {
        self.answers = answers;
        self.submitted_at = now;
    }

    /// Overwrite grading fields and stamp the grading time.
    pub fn grade(&mut self, grade: &Grade, grader: UserId, now: Time) {
        self.score = grade.score;
        self.feedback = grade.feedback.clone();
        self.graded_at = Some(now);
        self.graded_by = Some(grader);
    }

    /// Whether a tutor has graded this submission.
    pub fn is_graded(&self) -> bool {
        self.graded_at.is_some()
    }
}

/// Tutor-supplied grading fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    /// Score in `[0, max_score]`
    #[serde(default)]
    pub score: Option<u32>,
    /// Feedback text
    #[serde(default)]
    pub feedback: Option<String>,
}

/// Submission status as seen by the learner. Always derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    /// Nothing submitted and the deadline has not passed (or there is none)
    Pending,
    /// Nothing submitted and the deadline has passed
    Overdue,
    /// Submitted, not graded
    Submitted,
    /// Graded
    Graded,
}

impl SubmissionStatus {
    /// Upper-case label used in listings.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "PENDING",
            SubmissionStatus::Overdue => "OVERDUE",
            SubmissionStatus::Submitted => "SUBMITTED",
            SubmissionStatus::Graded => "GRADED",
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
