//! Dashboard aggregation service.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use coursetrack_assessment::{derive_status, is_closing_soon, AssessmentConfig};
use coursetrack_core::{
    Actor, AssignmentId, CourseId, LessonId, Progress, Result, SubmissionStatus, Time,
};
use coursetrack_progress::{compute_course_progress, percentage, EnrollmentResolver};
use coursetrack_storage::{read_with_retry, Storage};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Read-only rollups for a learner's home page.
#[async_trait]
pub trait Dashboard: Send + Sync {
    /// Summarize every course the actor is enrolled in.
    async fn summary(&self, actor: &Actor, now: Time) -> Result<DashboardSummary>;
}

/// Everything the learner dashboard shows, computed at `generated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    /// The `now` the summary was computed for
    pub generated_at: Time,

    /// Distinct courses on the interest list
    pub enrolled_courses: usize,

    /// Lessons across enrolled courses
    pub total_lessons: usize,

    /// Lessons whose lesson-level flag is set
    pub completed_lessons: usize,

    /// Assignments in enrolled courses without a submission. Overdue ones
    /// are counted too.
    pub pending_assignments: usize,

    /// `completed_lessons / total_lessons` as a rounded percentage
    pub overall_progress: u8,

    /// One row per enrolled course, in slug order
    pub courses: Vec<CourseSummary>,

    /// Unsubmitted assignments by due date, undated last
    pub upcoming: Vec<Deadline>,
}

/// Per-course row of the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSummary {
    /// Course slug
    pub course_id: CourseId,
    /// Course title, if the course record exists
    pub title: Option<String>,
    /// Lesson-count percentage
    pub percentage: u8,
    /// Lessons flagged completed
    pub completed_lessons: usize,
    /// Lessons in the course
    pub total_lessons: usize,
}

/// An assignment the learner still has to submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadline {
    /// Assignment
    pub assignment_id: AssignmentId,
    /// Course it belongs to
    pub course_id: CourseId,
    /// Title
    pub title: String,
    /// Due date
    pub due_date: Option<Time>,
    /// `Pending` or `Overdue`
    pub status: SubmissionStatus,
    /// Due within the closing-soon window
    pub closing_soon: bool,
}

/// Basic dashboard implementation.
#[derive(Clone)]
pub struct BasicDashboard {
    storage: Arc<dyn Storage>,
    enrollment: EnrollmentResolver,
    config: AssessmentConfig,
}

impl BasicDashboard {
    /// Create a dashboard over the given store.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            enrollment: EnrollmentResolver::new(storage.clone()),
            storage,
            config: AssessmentConfig::default(),
        }
    }

    /// Set the closing-soon window used for deadlines.
    pub fn with_config(mut self, config: AssessmentConfig) -> Self {
        self.config = config;
        self
    }
}

fn by_due_date(a: &Deadline, b: &Deadline) -> Ordering {
    let due = match (a.due_date, b.due_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    due.then_with(|| a.title.cmp(&b.title))
}

#[async_trait]
impl Dashboard for BasicDashboard {
    async fn summary(&self, actor: &Actor, now: Time) -> Result<DashboardSummary> {
        let courses = self.enrollment.accessible_courses(actor.user_id).await?;

        let progress: HashMap<LessonId, Progress> =
            read_with_retry("list_progress", || self.storage.list_progress(actor.user_id))
                .await?
                .into_iter()
                .map(|p| (p.lesson_id, p))
                .collect();
        let submitted: HashSet<AssignmentId> = read_with_retry("list_user_submissions", || {
            self.storage.list_user_submissions(actor.user_id)
        })
        .await?
        .into_iter()
        .map(|s| s.assignment_id)
        .collect();

        let mut rows = Vec::with_capacity(courses.len());
        let mut upcoming = Vec::new();
        let mut pending_assignments = 0;

        for course_id in &courses {
            let lessons =
                read_with_retry("list_lessons", || self.storage.list_lessons(course_id)).await?;
            let course =
                read_with_retry("load_course", || self.storage.load_course(course_id)).await?;
            let rollup = compute_course_progress(course_id, &lessons, &progress);

            rows.push(CourseSummary {
                course_id: course_id.clone(),
                title: course.map(|c| c.title),
                percentage: rollup.percentage,
                completed_lessons: rollup.completed_lessons,
                total_lessons: rollup.total_lessons,
            });

            let assignments =
                read_with_retry("list_assignments", || self.storage.list_assignments(course_id))
                    .await?;
            for assignment in assignments {
                if submitted.contains(&assignment.id) {
                    continue;
                }
                pending_assignments += 1;

                let status = derive_status(None, assignment.due_date, now);
                upcoming.push(Deadline {
                    closing_soon: is_closing_soon(
                        status,
                        assignment.due_date,
                        now,
                        self.config.closing_soon,
                    ),
                    assignment_id: assignment.id,
                    course_id: course_id.clone(),
                    title: assignment.title,
                    due_date: assignment.due_date,
                    status,
                });
            }
        }
        upcoming.sort_by(by_due_date);

        let total_lessons = rows.iter().map(|r| r.total_lessons).sum();
        let completed_lessons = rows.iter().map(|r| r.completed_lessons).sum();

        debug!(
            user_id = %actor.user_id,
            courses = rows.len(),
            pending_assignments,
            "dashboard computed"
        );

        Ok(DashboardSummary {
            generated_at: now,
            enrolled_courses: courses.len(),
            total_lessons,
            completed_lessons,
            pending_assignments,
            overall_progress: percentage(completed_lessons, total_lessons),
            courses: rows,
            upcoming,
        })
    }
}
