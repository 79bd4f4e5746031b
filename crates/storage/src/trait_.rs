//! Storage trait abstraction.

use async_trait::async_trait;
use coursetrack_core::{
    Answers, Assignment, AssignmentId, Course, CourseId, Grade, LearnError, Lesson, LessonId,
    Progress, ProgressChange, Submission, SubmissionId, Time, User, UserId,
};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database driver error
    #[error("database error: {0}")]
    Database(String),

    /// Item not found
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind
        kind: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl StorageError {
    /// Errors worth one transparent retry on a read path. Decoding failures
    /// and missing rows will not change on a second attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Io(_) | StorageError::Database(_))
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

impl From<StorageError> for LearnError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { kind, id } => LearnError::NotFound { kind, id },
            other => LearnError::Persistence(other.to_string()),
        }
    }
}

/// Outcome of [`Storage::upsert_submission`].
#[derive(Debug, Clone)]
pub struct SubmissionUpsert {
    /// The stored submission after the write
    pub submission: Submission,
    /// True when no submission existed for (user, assignment) before
    pub created: bool,
}

/// Storage abstraction for coursetrack data.
///
/// Methods take `&self`; backends provide their own interior locking so a
/// single store can be shared across concurrent requests behind an `Arc`.
/// The mutation methods (`apply_progress`, `upsert_submission`,
/// `grade_submission`) are atomic: they either apply fully or leave the
/// previous state untouched.
#[async_trait]
pub trait Storage: Send + Sync {
    // === User operations ===

    /// Save a user (create or update).
    async fn save_user(&self, user: &User) -> Result<()>;

    /// Load a user by ID.
    async fn load_user(&self, id: UserId) -> Result<Option<User>>;

    /// List all users.
    async fn list_users(&self) -> Result<Vec<User>>;

    // === Course content ===

    /// Save a course.
    async fn save_course(&self, course: &Course) -> Result<()>;

    /// Load a course by slug.
    async fn load_course(&self, id: &CourseId) -> Result<Option<Course>>;

    /// Save a lesson.
    async fn save_lesson(&self, lesson: &Lesson) -> Result<()>;

    /// Load a lesson by ID.
    async fn load_lesson(&self, id: LessonId) -> Result<Option<Lesson>>;

    /// Lessons of a course, sorted by order index.
    async fn list_lessons(&self, course_id: &CourseId) -> Result<Vec<Lesson>>;

    /// Save an assignment.
    async fn save_assignment(&self, assignment: &Assignment) -> Result<()>;

    /// Load an assignment by ID.
    async fn load_assignment(&self, id: AssignmentId) -> Result<Option<Assignment>>;

    /// Assignments of a course, in creation order.
    async fn list_assignments(&self, course_id: &CourseId) -> Result<Vec<Assignment>>;

    // === Progress ===

    /// Load the progress row of a user for a lesson.
    async fn load_progress(&self, user_id: UserId, lesson_id: LessonId) -> Result<Option<Progress>>;

    /// All progress rows of a user.
    async fn list_progress(&self, user_id: UserId) -> Result<Vec<Progress>>;

    /// Atomically apply a change to the (user, lesson) progress row, creating
    /// it first if needed. Returns the row as stored after the change.
    async fn apply_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        change: ProgressChange,
        now: Time,
    ) -> Result<Progress>;

    // === Submissions ===

    /// Load a submission by ID.
    async fn load_submission(&self, id: SubmissionId) -> Result<Option<Submission>>;

    /// The submission of a user for an assignment, if any.
    async fn find_submission(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
    ) -> Result<Option<Submission>>;

    /// All submissions for an assignment.
    async fn list_submissions(&self, assignment_id: AssignmentId) -> Result<Vec<Submission>>;

    /// All submissions of a user.
    async fn list_user_submissions(&self, user_id: UserId) -> Result<Vec<Submission>>;

    /// Create the (user, assignment) submission or replace its answers.
    /// Grading fields of an existing submission are preserved.
    async fn upsert_submission(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
        answers: &Answers,
        now: Time,
    ) -> Result<SubmissionUpsert>;

    /// Overwrite the grading fields of a submission and stamp `graded_at`.
    /// Fails with [`StorageError::NotFound`] if the submission does not exist.
    async fn grade_submission(
        &self,
        id: SubmissionId,
        grade: &Grade,
        grader: UserId,
        now: Time,
    ) -> Result<Submission>;
}
