//! Users and the actor identity supplied by the session layer.

use serde::{Deserialize, Deserializer, Serialize};

use crate::id::{CourseId, UserId};

/// A platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: UserId,

    /// Display name
    pub name: String,

    /// Role granted by the identity provider
    pub role: Role,

    /// Courses the user has expressed interest in. Membership here is the
    /// only thing that grants access to a course. Never holds duplicates.
    #[serde(default, deserialize_with = "distinct_interests")]
    pub interests: Vec<CourseId>,
}

/// Stored records are written by hand too; collapse repeated slugs on load
/// so the list keeps the same shape `add_interest` produces.
fn distinct_interests<'de, D>(deserializer: D) -> std::result::Result<Vec<CourseId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<CourseId>::deserialize(deserializer)?;
    let mut interests: Vec<CourseId> = Vec::with_capacity(raw.len());
    for course in raw {
        if !interests.contains(&course) {
            interests.push(course);
        }
    }
    Ok(interests)
}

impl User {
    /// Create a user with an empty interest list.
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            role,
            interests: Vec::new(),
        }
    }

    /// Builder-style helper to set the interest list.
    pub fn with_interests(mut self, interests: impl IntoIterator<Item = CourseId>) -> Self {
        self.interests = Vec::new();
        for course in interests {
            self.add_interest(course);
        }
        self
    }

    /// Add a course to the interest list, ignoring duplicates.
    pub fn add_interest(&mut self, course: CourseId) {
        if !self.interests.contains(&course) {
            self.interests.push(course);
        }
    }

    /// Remove a course from the interest list. Returns whether it was present.
    pub fn remove_interest(&mut self, course: &CourseId) -> bool {
        let before = self.interests.len();
        self.interests.retain(|c| c != course);
        before != self.interests.len()
    }

    /// The authenticated identity for this user.
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.id,
            role: self.role,
        }
    }
}

/// User roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Takes courses and submits assignments
    Learner,
    /// Grades submissions for the courses on their own interest list
    Tutor,
    /// Platform administrator; grades like a tutor
    Admin,
}

impl Role {
    /// Whether this role may grade submissions at all.
    pub fn can_grade(self) -> bool {
        matches!(self, Role::Tutor | Role::Admin)
    }
}

/// The authenticated (user, role) pair a call runs as.
///
/// Supplied by the session layer and trusted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Calling user
    pub user_id: UserId,
    /// Role asserted by the identity provider
    pub role: Role,
}

impl Actor {
    /// Create an actor.
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }
}
