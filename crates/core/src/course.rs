//! Course content model: courses, lessons and their modules.

use serde::{Deserialize, Serialize};

use crate::id::{CourseId, LessonId, ModuleId};

/// A course. Lessons reference their course rather than the other way around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Course slug
    pub id: CourseId,

    /// Title
    pub title: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
}

impl Course {
    /// Create a course.
    pub fn new(id: CourseId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
        }
    }
}

/// A lesson inside a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    /// Unique identifier
    pub id: LessonId,

    /// Owning course
    pub course_id: CourseId,

    /// Lesson title
    pub title: String,

    /// Position within the course
    pub order: u32,

    /// Ordered modules
    #[serde(default)]
    pub modules: Vec<Module>,
}

impl Lesson {
    /// Create a lesson with no modules.
    pub fn new(course_id: CourseId, title: impl Into<String>, order: u32) -> Self {
        Self {
            id: LessonId::new(),
            course_id,
            title: title.into(),
            order,
            modules: Vec::new(),
        }
    }

    /// Append a module, assigning it the next order index.
    pub fn with_module(mut self, title: impl Into<String>) -> Self {
        let order = self.modules.len() as u32;
        self.modules.push(Module::new(title, order));
        self
    }

    /// Look up a module of this lesson.
    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.iter().find(|m| m.id == id)
    }

    /// Whether the module belongs to this lesson.
    pub fn contains_module(&self, id: ModuleId) -> bool {
        self.module(id).is_some()
    }

    /// Modules sorted by their order index.
    pub fn ordered_modules(&self) -> Vec<&Module> {
        let mut modules: Vec<&Module> = self.modules.iter().collect();
        modules.sort_by_key(|m| m.order);
        modules
    }
}

/// Smallest completable unit inside a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Unique identifier
    pub id: ModuleId,

    /// Module title
    pub title: String,

    /// Attached resources (URLs)
    #[serde(default)]
    pub resources: Vec<String>,

    /// Position within the lesson
    pub order: u32,
}

impl Module {
    /// Create a module.
    pub fn new(title: impl Into<String>, order: u32) -> Self {
        Self {
            id: ModuleId::new(),
            title: title.into(),
            resources: Vec::new(),
            order,
        }
    }
}
