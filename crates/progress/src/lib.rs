//! Progress Tracking
//!
//! Enrollment resolution, module/lesson completion and the lesson- and
//! course-level progress percentages derived from them.

#![warn(missing_docs)]

pub mod enrollment;
pub mod calc;
pub mod tracker;

pub use enrollment::EnrollmentResolver;
pub use calc::{compute_course_progress, compute_lesson_progress, percentage};
pub use tracker::{ProgressTracker, BasicProgressTracker, CourseOutline, LessonSummary};
