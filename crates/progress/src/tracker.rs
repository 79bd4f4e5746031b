//! Progress tracking service.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use coursetrack_core::{
    Actor, Course, CourseId, CourseProgress, LearnError, Lesson, LessonCompletion, LessonId,
    LessonProgress, ModuleId, ModuleToggle, Progress, ProgressChange, Result, Time,
};
use coursetrack_storage::{read_with_retry, Storage};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calc::{compute_course_progress, compute_lesson_progress};
use crate::enrollment::EnrollmentResolver;

/// Progress tracking service.
///
/// Every operation acts on the calling learner's own progress and requires
/// enrollment in the course the lesson belongs to.
#[async_trait]
pub trait ProgressTracker: Send + Sync {
    /// Check a module off (or un-check it). Creates the progress row on
    /// first use and leaves the lesson-level flag alone.
    async fn toggle_module(
        &self,
        actor: &Actor,
        lesson_id: LessonId,
        module_id: ModuleId,
        completed: bool,
        now: Time,
    ) -> Result<ModuleToggle>;

    /// Set the lesson-level completion flag, independently of modules.
    async fn set_lesson_completed(
        &self,
        actor: &Actor,
        lesson_id: LessonId,
        completed: bool,
        now: Time,
    ) -> Result<LessonCompletion>;

    /// Progress through one lesson.
    async fn get_lesson_progress(&self, actor: &Actor, lesson_id: LessonId) -> Result<LessonProgress>;

    /// Progress through one course.
    async fn get_course_progress(&self, actor: &Actor, course_id: &CourseId) -> Result<CourseProgress>;

    /// Lessons of a course in order, each with its progress.
    async fn course_outline(&self, actor: &Actor, course_id: &CourseId) -> Result<CourseOutline>;
}

/// A course's lessons with per-lesson progress, as shown on a course page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseOutline {
    /// Course slug
    pub course_id: CourseId,
    /// Course title, when the course record exists
    pub title: Option<String>,
    /// Lessons in order
    pub lessons: Vec<LessonSummary>,
    /// Course-level rollup
    pub progress: CourseProgress,
}

/// One row of a [`CourseOutline`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonSummary {
    /// Lesson
    pub lesson_id: LessonId,
    /// Title
    pub title: String,
    /// Position in the course
    pub order: u32,
    /// Number of modules
    pub total_modules: usize,
    /// Module-based percentage
    pub percentage: u8,
    /// Lesson-level flag
    pub completed: bool,
}

/// Basic progress tracker implementation.
#[derive(Clone)]
pub struct BasicProgressTracker {
    storage: Arc<dyn Storage>,
    enrollment: EnrollmentResolver,
}

impl BasicProgressTracker {
    /// Create a new progress tracker.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            enrollment: EnrollmentResolver::new(storage.clone()),
            storage,
        }
    }

    /// The enrollment resolver this tracker checks access with.
    pub fn enrollment(&self) -> &EnrollmentResolver {
        &self.enrollment
    }

    async fn load_lesson(&self, lesson_id: LessonId) -> Result<Lesson> {
        read_with_retry("load_lesson", || self.storage.load_lesson(lesson_id))
            .await?
            .ok_or_else(|| LearnError::not_found("lesson", lesson_id))
    }

    /// Load a lesson and check the actor may access its course.
    async fn accessible_lesson(&self, actor: &Actor, lesson_id: LessonId) -> Result<Lesson> {
        let lesson = self.load_lesson(lesson_id).await?;
        self.enrollment
            .require_enrolled(actor, &lesson.course_id)
            .await?;
        Ok(lesson)
    }

    /// Lessons of a course and the actor's progress rows keyed by lesson.
    async fn course_state(
        &self,
        actor: &Actor,
        course_id: &CourseId,
    ) -> Result<(Vec<Lesson>, HashMap<LessonId, Progress>)> {
        self.enrollment.require_enrolled(actor, course_id).await?;

        let lessons = read_with_retry("list_lessons", || self.storage.list_lessons(course_id)).await?;
        let progress = read_with_retry("list_progress", || self.storage.list_progress(actor.user_id))
            .await?
            .into_iter()
            .map(|p| (p.lesson_id, p))
            .collect();
        Ok((lessons, progress))
    }
}

#[async_trait]
impl ProgressTracker for BasicProgressTracker {
    async fn toggle_module(
        &self,
        actor: &Actor,
        lesson_id: LessonId,
        module_id: ModuleId,
        completed: bool,
        now: Time,
    ) -> Result<ModuleToggle> {
        let lesson = self.accessible_lesson(actor, lesson_id).await?;
        if !lesson.contains_module(module_id) {
            return Err(LearnError::not_found("module", module_id));
        }

        let progress = self
            .storage
            .apply_progress(
                actor.user_id,
                lesson_id,
                ProgressChange::Module { module_id, completed },
                now,
            )
            .await?;

        info!(user_id = %actor.user_id, %lesson_id, %module_id, completed, "module toggled");
        Ok(ModuleToggle {
            completed_modules: progress.completed_modules,
        })
    }

    async fn set_lesson_completed(
        &self,
        actor: &Actor,
        lesson_id: LessonId,
        completed: bool,
        now: Time,
    ) -> Result<LessonCompletion> {
        self.accessible_lesson(actor, lesson_id).await?;

        let progress = self
            .storage
            .apply_progress(
                actor.user_id,
                lesson_id,
                ProgressChange::Lesson { completed },
                now,
            )
            .await?;

        info!(user_id = %actor.user_id, %lesson_id, completed, "lesson completion set");
        Ok(LessonCompletion {
            completed: progress.completed,
        })
    }

    async fn get_lesson_progress(&self, actor: &Actor, lesson_id: LessonId) -> Result<LessonProgress> {
        let lesson = self.accessible_lesson(actor, lesson_id).await?;
        let progress = read_with_retry("load_progress", || {
            self.storage.load_progress(actor.user_id, lesson_id)
        })
        .await?;
        Ok(compute_lesson_progress(progress.as_ref(), &lesson))
    }

    async fn get_course_progress(&self, actor: &Actor, course_id: &CourseId) -> Result<CourseProgress> {
        let (lessons, progress) = self.course_state(actor, course_id).await?;
        Ok(compute_course_progress(course_id, &lessons, &progress))
    }

    async fn course_outline(&self, actor: &Actor, course_id: &CourseId) -> Result<CourseOutline> {
        let (lessons, progress) = self.course_state(actor, course_id).await?;
        let course: Option<Course> =
            read_with_retry("load_course", || self.storage.load_course(course_id)).await?;

        let summaries = lessons
            .iter()
            .map(|lesson| {
                let view = compute_lesson_progress(progress.get(&lesson.id), lesson);
                LessonSummary {
                    lesson_id: lesson.id,
                    title: lesson.title.clone(),
                    order: lesson.order,
                    total_modules: lesson.modules.len(),
                    percentage: view.percentage,
                    completed: view.completed,
                }
            })
            .collect();

        Ok(CourseOutline {
            course_id: course_id.clone(),
            title: course.map(|c| c.title),
            lessons: summaries,
            progress: compute_course_progress(course_id, &lessons, &progress),
        })
    }
}
