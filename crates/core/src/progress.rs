//! Per-user lesson progress records and the views derived from them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::id::{CourseId, LessonId, ModuleId, UserId};
use crate::Time;

/// Progress of one user through one lesson.
///
/// Created lazily on the first module toggle or lesson-completion action and
/// never deleted. `completed` is the lesson-level flag and is deliberately
/// independent from the module set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Learner
    pub user_id: UserId,

    /// Lesson
    pub lesson_id: LessonId,

    /// Modules the learner has checked off
    #[serde(default)]
    pub completed_modules: BTreeSet<ModuleId>,

    /// Lesson-level completion flag
    #[serde(default)]
    pub completed: bool,

    /// Last mutation
    pub updated_at: Time,
}

impl Progress {
    /// Fresh, empty progress row.
    pub fn new(user_id: UserId, lesson_id: LessonId, now: Time) -> Self {
        Self {
            user_id,
            lesson_id,
            completed_modules: BTreeSet::new(),
            completed: false,
            updated_at: now,
        }
    }

    /// Apply a mutation in place. Storage backends call this inside their
    /// lock or transaction so the read-modify-write is atomic.
    pub fn apply(&mut self, change: &ProgressChange, now: Time) {
        match change {
            ProgressChange::Module { module_id, completed } => {
                if *completed {
                    self.completed_modules.insert(*module_id);
                } else {
                    self.completed_modules.remove(module_id);
                }
            }
            ProgressChange::Lesson { completed } => {
                self.completed = *completed;
            }
        }
        self.updated_at = now;
    }
}

/// A single mutation of a [`Progress`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressChange {
    /// Mark one module done or not done
    Module {
        /// Module being toggled
        module_id: ModuleId,
        /// Target state
        completed: bool,
    },
    /// Set the lesson-level flag
    Lesson {
        /// Target state
        completed: bool,
    },
}

/// Result of a module toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleToggle {
    /// Completed modules after the toggle
    pub completed_modules: BTreeSet<ModuleId>,
}

/// Result of setting the lesson-level flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonCompletion {
    /// Flag after the update
    pub completed: bool,
}

/// Progress view for one lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonProgress {
    /// Lesson
    pub lesson_id: LessonId,
    /// Completed modules, restricted to modules the lesson still has
    pub completed_modules: BTreeSet<ModuleId>,
    /// Lesson-level flag
    pub completed: bool,
    /// Percentage complete (0-100)
    pub percentage: u8,
}

/// Progress view for one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseProgress {
    /// Course
    pub course_id: CourseId,
    /// Percentage complete (0-100), counted in lessons
    pub percentage: u8,
    /// Lessons whose lesson-level flag is set
    pub completed_lessons: usize,
    /// Lessons in the course
    pub total_lessons: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_change_is_idempotent() {
        let now = chrono::Utc::now();
        let module_id = ModuleId::new();
        let mut progress = Progress::new(UserId::new(), LessonId::new(), now);

        let on = ProgressChange::Module { module_id, completed: true };
        progress.apply(&on, now);
        progress.apply(&on, now);
        assert_eq!(progress.completed_modules.len(), 1);

        let off = ProgressChange::Module { module_id, completed: false };
        progress.apply(&off, now);
        progress.apply(&off, now);
        assert!(progress.completed_modules.is_empty());
    }

    #[test]
    fn test_lesson_change_leaves_modules_alone() {
        let now = chrono::Utc::now();
        let module_id = ModuleId::new();
        let mut progress = Progress::new(UserId::new(), LessonId::new(), now);
        progress.apply(&ProgressChange::Module { module_id, completed: true }, now);

        progress.apply(&ProgressChange::Lesson { completed: true }, now);
        assert!(progress.completed);
        assert!(progress.completed_modules.contains(&module_id));

        progress.apply(&ProgressChange::Lesson { completed: false }, now);
        assert!(!progress.completed);
        assert_eq!(progress.completed_modules.len(), 1);
    }
}
