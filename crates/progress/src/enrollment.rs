//! Enrollment resolution.
//!
//! There is no enrollment table: a user may access a course exactly when the
//! course slug is on their interest list. Every access check in the workspace
//! goes through [`EnrollmentResolver`], and nothing here is cached, so taking
//! a course off the list revokes access on the very next call.

use std::collections::BTreeSet;
use std::sync::Arc;

use coursetrack_core::{Actor, CourseId, LearnError, Result, User, UserId};
use coursetrack_storage::{read_with_retry, Storage};
use tracing::debug;

/// Derives course access from user interest lists.
#[derive(Clone)]
pub struct EnrollmentResolver {
    storage: Arc<dyn Storage>,
}

impl EnrollmentResolver {
    /// Create a resolver over the given store.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    async fn load_user(&self, user_id: UserId) -> Result<Option<User>> {
        let user = read_with_retry("load_user", || self.storage.load_user(user_id)).await?;
        Ok(user)
    }

    /// Courses the user may access. An unknown user has no courses.
    pub async fn accessible_courses(&self, user_id: UserId) -> Result<BTreeSet<CourseId>> {
        let courses = match self.load_user(user_id).await? {
            Some(user) => user.interests.into_iter().collect(),
            None => {
                debug!(%user_id, "unknown user resolves to no courses");
                BTreeSet::new()
            }
        };
        Ok(courses)
    }

    /// Whether the user may access the course.
    pub async fn is_enrolled(&self, user_id: UserId, course_id: &CourseId) -> Result<bool> {
        Ok(self
            .load_user(user_id)
            .await?
            .map(|u| u.interests.contains(course_id))
            .unwrap_or(false))
    }

    /// Fail with [`LearnError::AccessDenied`] unless the actor may access the course.
    pub async fn require_enrolled(&self, actor: &Actor, course_id: &CourseId) -> Result<()> {
        if self.is_enrolled(actor.user_id, course_id).await? {
            Ok(())
        } else {
            Err(LearnError::AccessDenied(format!(
                "not enrolled in course {}",
                course_id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursetrack_core::Role;
    use coursetrack_storage::MemoryStorage;

    fn course(slug: &str) -> CourseId {
        CourseId::new(slug).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_user_has_no_courses() {
        let resolver = EnrollmentResolver::new(Arc::new(MemoryStorage::new()));
        let courses = resolver.accessible_courses(UserId::new()).await.unwrap();
        assert!(courses.is_empty());
    }

    #[tokio::test]
    async fn test_interest_list_is_access_set() {
        let storage = Arc::new(MemoryStorage::new());
        let user = User::new("Ada", Role::Learner).with_interests([course("a"), course("b")]);
        storage.save_user(&user).await.unwrap();

        let resolver = EnrollmentResolver::new(storage);
        let courses = resolver.accessible_courses(user.id).await.unwrap();
        assert_eq!(courses.len(), 2);
        assert!(courses.contains(&course("a")));
        assert!(resolver.require_enrolled(&user.actor(), &course("b")).await.is_ok());
    }

    #[tokio::test]
    async fn test_removal_revokes_immediately() {
        let storage = Arc::new(MemoryStorage::new());
        let mut user = User::new("Ada", Role::Learner).with_interests([course("a")]);
        storage.save_user(&user).await.unwrap();
        let resolver = EnrollmentResolver::new(storage.clone());
        assert!(resolver.is_enrolled(user.id, &course("a")).await.unwrap());

        user.remove_interest(&course("a"));
        storage.save_user(&user).await.unwrap();

        let err = resolver
            .require_enrolled(&user.actor(), &course("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, LearnError::AccessDenied(_)));
    }
}
