//! coursetrack core data models.
//!
//! This crate defines the entities shared by the progress, assessment and
//! dashboard services, plus the error taxonomy they report through.

#![warn(missing_docs)]

// Core identities
mod id;
mod error;

// Users and content
mod user;
mod course;

// Learner state
mod progress;
mod assignment;
mod event;

// Re-exports
pub use id::*;
pub use error::{LearnError, Result};

pub use user::{Actor, Role, User};
pub use course::{Course, Lesson, Module};

pub use progress::{
    Progress, ProgressChange, ModuleToggle, LessonCompletion, LessonProgress, CourseProgress,
};
pub use assignment::{
    Assignment, AssignmentKind, Answers, Submission, Grade, SubmissionStatus,
};
pub use event::LearningEvent;

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
