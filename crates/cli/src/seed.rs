//! JSON fixtures for `coursetrack seed`.

use std::path::Path;

use anyhow::{Context, Result};
use coursetrack_core::{Assignment, Course, Lesson, User};
use coursetrack_storage::Storage;
use serde::{Deserialize, Serialize};

/// Catalog and users to load into a store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    /// Users with their roles and interest lists
    #[serde(default)]
    pub users: Vec<User>,
    /// Courses
    #[serde(default)]
    pub courses: Vec<Course>,
    /// Lessons with their modules
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    /// Assignments
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

/// Counts of what a fixture wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Users written
    pub users: usize,
    /// Courses written
    pub courses: usize,
    /// Lessons written
    pub lessons: usize,
    /// Assignments written
    pub assignments: usize,
}

impl Fixture {
    /// Read a fixture file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse fixture: {}", path.display()))
    }

    /// Write every entity. Existing records with the same id are replaced.
    pub async fn apply(&self, storage: &dyn Storage) -> Result<SeedReport> {
        for user in &self.users {
            storage.save_user(user).await?;
        }
        for course in &self.courses {
            storage.save_course(course).await?;
        }
        for lesson in &self.lessons {
            storage.save_lesson(lesson).await?;
        }
        for assignment in &self.assignments {
            storage.save_assignment(assignment).await?;
        }
        Ok(SeedReport {
            users: self.users.len(),
            courses: self.courses.len(),
            lessons: self.lessons.len(),
            assignments: self.assignments.len(),
        })
    }
}
