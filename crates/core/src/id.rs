//! Unique identifiers for coursetrack entities.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::LearnError;

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Ulid);

        impl $name {
            /// Generate a new identifier.
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

ulid_id!(
    /// Unique identifier for a User
    UserId
);
ulid_id!(
    /// Unique identifier for a Lesson
    LessonId
);
ulid_id!(
    /// Unique identifier for a Module inside a lesson
    ModuleId
);
ulid_id!(
    /// Unique identifier for an Assignment
    AssignmentId
);
ulid_id!(
    /// Unique identifier for a Submission
    SubmissionId
);

/// Parse an identifier received from outside, mapping decode failures to a
/// validation error that names the kind of id.
pub fn parse_id<T>(kind: &str, raw: &str) -> Result<T, LearnError>
where
    T: std::str::FromStr,
{
    raw.trim()
        .parse()
        .map_err(|_| LearnError::Validation(format!("malformed {} id: {:?}", kind, raw)))
}

/// Course identifier.
///
/// Courses are addressed by a human-readable slug (e.g. `rust-101`), which is
/// also what users carry in their interest list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CourseId(String);

impl CourseId {
    /// Create a course identifier.
    ///
    /// Slugs are ASCII letters, digits, `-`, `_` and `.`, and may not start
    /// with a dot.
    pub fn new(slug: impl Into<String>) -> Result<Self, LearnError> {
        let slug = slug.into();
        if slug.is_empty() {
            return Err(LearnError::Validation("course id must not be empty".to_string()));
        }
        let valid = slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid || slug.starts_with('.') {
            return Err(LearnError::Validation(format!(
                "malformed course id: {:?}",
                slug
            )));
        }
        Ok(Self(slug))
    }

    /// Borrow the slug.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CourseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CourseId {
    type Err = LearnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CourseId {
    type Error = LearnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CourseId> for String {
    fn from(id: CourseId) -> Self {
        id.0
    }
}
