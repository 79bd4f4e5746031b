//! Submission lifecycle service.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use coursetrack_core::{
    Actor, Answers, Assignment, AssignmentId, CourseId, Grade, LearnError, LearningEvent, Result,
    Submission, SubmissionId, SubmissionStatus, Time, UserId,
};
use coursetrack_progress::EnrollmentResolver;
use coursetrack_storage::{read_with_retry, Storage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::events::{EventSink, TracingEventSink};
use crate::status::{derive_status, is_closing_soon};
use crate::validation::{validate_answers, validate_grade};

/// Default width of the "closing soon" window, in hours.
pub const DEFAULT_CLOSING_SOON_HOURS: i64 = 48;

/// Tunables for the submission manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssessmentConfig {
    /// A pending assignment due within this window is flagged as closing soon.
    pub closing_soon: Duration,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            closing_soon: Duration::hours(DEFAULT_CLOSING_SOON_HOURS),
        }
    }
}

impl AssessmentConfig {
    /// Config with a closing-soon window of `hours`. Negative windows and
    /// windows too large for a [`Duration`] are rejected.
    pub fn with_closing_soon_hours(hours: i64) -> Result<Self> {
        if hours < 0 {
            return Err(LearnError::Validation(
                "closing_soon_hours must not be negative".to_string(),
            ));
        }
        let closing_soon = Duration::try_hours(hours).ok_or_else(|| {
            LearnError::Validation(format!("closing_soon_hours is out of range: {}", hours))
        })?;
        Ok(Self { closing_soon })
    }
}

/// One assignment as listed for a learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentView {
    /// The assignment
    pub assignment: Assignment,
    /// Derived status for the learner
    pub status: SubmissionStatus,
    /// Pending and due within the closing-soon window
    pub closing_soon: bool,
    /// The learner's submission, if any
    pub submission: Option<Submission>,
}

/// One entry of a tutor's review queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    /// Title of the assignment the submission answers
    pub assignment_title: String,
    /// Highest score the tutor may award
    pub max_score: u32,
    /// The submission
    pub submission: Submission,
}

/// Submission lifecycle service.
#[async_trait]
pub trait SubmissionManager: Send + Sync {
    /// Create or replace the caller's submission for an assignment.
    ///
    /// Resubmitting keeps any existing grade; only the answers and
    /// `submitted_at` change.
    async fn submit_assignment(
        &self,
        actor: &Actor,
        assignment_id: AssignmentId,
        answers: Answers,
        now: Time,
    ) -> Result<Submission>;

    /// Record a tutor's score and/or feedback. Re-grading overwrites.
    async fn grade_submission(
        &self,
        tutor: &Actor,
        submission_id: SubmissionId,
        grade: Grade,
        now: Time,
    ) -> Result<Submission>;

    /// Derived status of the caller's own work on an assignment.
    async fn submission_status(
        &self,
        actor: &Actor,
        assignment_id: AssignmentId,
        now: Time,
    ) -> Result<SubmissionStatus> {
        self.submission_status_for(actor, assignment_id, actor.user_id, now)
            .await
    }

    /// Derived status of `user_id`'s work on an assignment, as seen by the
    /// owner or a tutor of the course.
    async fn submission_status_for(
        &self,
        actor: &Actor,
        assignment_id: AssignmentId,
        user_id: UserId,
        now: Time,
    ) -> Result<SubmissionStatus>;

    /// The caller's assignments in a course with their derived status.
    async fn list_assignments(
        &self,
        actor: &Actor,
        course_id: &CourseId,
        now: Time,
    ) -> Result<Vec<AssignmentView>>;

    /// A single submission, for its owner or a tutor of the course.
    async fn view_submission(&self, actor: &Actor, submission_id: SubmissionId) -> Result<Submission>;

    /// Submissions of a course awaiting review: ungraded first, then oldest first.
    async fn review_queue(&self, tutor: &Actor, course_id: &CourseId) -> Result<Vec<ReviewItem>>;
}

/// Basic submission manager implementation.
#[derive(Clone)]
pub struct BasicSubmissionManager {
    storage: Arc<dyn Storage>,
    enrollment: EnrollmentResolver,
    events: Arc<dyn EventSink>,
    config: AssessmentConfig,
}

impl BasicSubmissionManager {
    /// Create a manager that logs events and uses the default config.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            enrollment: EnrollmentResolver::new(storage.clone()),
            storage,
            events: Arc::new(TracingEventSink),
            config: AssessmentConfig::default(),
        }
    }

    /// Set the event sink.
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Set the config.
    pub fn with_config(mut self, config: AssessmentConfig) -> Self {
        self.config = config;
        self
    }

    /// Current config.
    pub fn config(&self) -> &AssessmentConfig {
        &self.config
    }

    async fn load_assignment(&self, id: AssignmentId) -> Result<Assignment> {
        read_with_retry("load_assignment", || self.storage.load_assignment(id))
            .await?
            .ok_or_else(|| LearnError::not_found("assignment", id))
    }

    async fn load_submission(&self, id: SubmissionId) -> Result<Submission> {
        read_with_retry("load_submission", || self.storage.load_submission(id))
            .await?
            .ok_or_else(|| LearnError::not_found("submission", id))
    }

    /// Tutors and admins act on a course only through their own interest list.
    async fn require_tutor(&self, actor: &Actor, course_id: &CourseId) -> Result<()> {
        if !actor.role.can_grade() {
            return Err(LearnError::AccessDenied(
                "only tutors can review submissions".to_string(),
            ));
        }
        self.enrollment.require_enrolled(actor, course_id).await
    }

    /// Owners see their own work while enrolled; anyone else must be a tutor
    /// of the course.
    async fn require_viewer(&self, actor: &Actor, owner: UserId, course_id: &CourseId) -> Result<()> {
        if actor.user_id == owner {
            self.enrollment.require_enrolled(actor, course_id).await
        } else {
            self.require_tutor(actor, course_id).await
        }
    }

    fn publish(&self, event: LearningEvent) {
        debug!(event = event.name(), submission_id = %event.submission_id(), "publishing");
        self.events.publish(&event);
    }
}

#[async_trait]
impl SubmissionManager for BasicSubmissionManager {
    async fn submit_assignment(
        &self,
        actor: &Actor,
        assignment_id: AssignmentId,
        answers: Answers,
        now: Time,
    ) -> Result<Submission> {
        let assignment = self.load_assignment(assignment_id).await?;
        self.enrollment
            .require_enrolled(actor, &assignment.course_id)
            .await?;
        let answers = validate_answers(&assignment, answers)?;

        let upsert = self
            .storage
            .upsert_submission(actor.user_id, assignment_id, &answers, now)
            .await?;
        let submission = upsert.submission;

        info!(
            user_id = %actor.user_id,
            %assignment_id,
            submission_id = %submission.id,
            created = upsert.created,
            "assignment submitted"
        );

        let event = if upsert.created {
            LearningEvent::SubmissionCreated {
                submission_id: submission.id,
                assignment_id,
                course_id: assignment.course_id.clone(),
                user_id: actor.user_id,
                at: now,
            }
        } else {
            LearningEvent::SubmissionUpdated {
                submission_id: submission.id,
                assignment_id,
                course_id: assignment.course_id.clone(),
                user_id: actor.user_id,
                at: now,
            }
        };
        self.publish(event);

        Ok(submission)
    }

    async fn grade_submission(
        &self,
        tutor: &Actor,
        submission_id: SubmissionId,
        grade: Grade,
        now: Time,
    ) -> Result<Submission> {
        if !tutor.role.can_grade() {
            return Err(LearnError::AccessDenied(
                "only tutors can grade submissions".to_string(),
            ));
        }

        let submission = self.load_submission(submission_id).await?;
        let assignment = self.load_assignment(submission.assignment_id).await?;
        self.require_tutor(tutor, &assignment.course_id).await?;
        let grade = validate_grade(&assignment, grade)?;

        let graded = self
            .storage
            .grade_submission(submission_id, &grade, tutor.user_id, now)
            .await?;

        info!(
            %submission_id,
            graded_by = %tutor.user_id,
            score = ?graded.score,
            "submission graded"
        );
        self.publish(LearningEvent::SubmissionGraded {
            submission_id,
            user_id: graded.user_id,
            graded_by: tutor.user_id,
            score: graded.score,
            at: now,
        });

        Ok(graded)
    }

    async fn submission_status_for(
        &self,
        actor: &Actor,
        assignment_id: AssignmentId,
        user_id: UserId,
        now: Time,
    ) -> Result<SubmissionStatus> {
        let assignment = self.load_assignment(assignment_id).await?;
        self.require_viewer(actor, user_id, &assignment.course_id)
            .await?;

        let submission = read_with_retry("find_submission", || {
            self.storage.find_submission(user_id, assignment_id)
        })
        .await?;
        Ok(derive_status(submission.as_ref(), assignment.due_date, now))
    }

    async fn list_assignments(
        &self,
        actor: &Actor,
        course_id: &CourseId,
        now: Time,
    ) -> Result<Vec<AssignmentView>> {
        self.enrollment.require_enrolled(actor, course_id).await?;

        let assignments =
            read_with_retry("list_assignments", || self.storage.list_assignments(course_id)).await?;
        let mut submissions: HashMap<AssignmentId, Submission> =
            read_with_retry("list_user_submissions", || {
                self.storage.list_user_submissions(actor.user_id)
            })
            .await?
            .into_iter()
            .map(|s| (s.assignment_id, s))
            .collect();

        let mut views: Vec<AssignmentView> = assignments
            .into_iter()
            .map(|assignment| {
                let submission = submissions.remove(&assignment.id);
                let status = derive_status(submission.as_ref(), assignment.due_date, now);
                let closing_soon =
                    is_closing_soon(status, assignment.due_date, now, self.config.closing_soon);
                AssignmentView {
                    assignment,
                    status,
                    closing_soon,
                    submission,
                }
            })
            .collect();

        views.sort_by(|a, b| {
            let by_due = match (a.assignment.due_date, b.assignment.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            by_due.then_with(|| a.assignment.title.cmp(&b.assignment.title))
        });
        Ok(views)
    }

    async fn view_submission(&self, actor: &Actor, submission_id: SubmissionId) -> Result<Submission> {
        let submission = self.load_submission(submission_id).await?;
        let assignment = self.load_assignment(submission.assignment_id).await?;
        self.require_viewer(actor, submission.user_id, &assignment.course_id)
            .await?;
        Ok(submission)
    }

    async fn review_queue(&self, tutor: &Actor, course_id: &CourseId) -> Result<Vec<ReviewItem>> {
        self.require_tutor(tutor, course_id).await?;

        let assignments =
            read_with_retry("list_assignments", || self.storage.list_assignments(course_id)).await?;

        let mut queue = Vec::new();
        for assignment in assignments {
            let submissions = read_with_retry("list_submissions", || {
                self.storage.list_submissions(assignment.id)
            })
            .await?;
            queue.extend(submissions.into_iter().map(|submission| ReviewItem {
                assignment_title: assignment.title.clone(),
                max_score: assignment.max_score,
                submission,
            }));
        }

        queue.sort_by(|a, b| {
            a.submission
                .is_graded()
                .cmp(&b.submission.is_graded())
                .then_with(|| a.submission.submitted_at.cmp(&b.submission.submitted_at))
        });
        Ok(queue)
    }
}
