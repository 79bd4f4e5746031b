//! In-memory storage backend.
//!
//! Everything lives behind a single `RwLock`; mutations hold the write half
//! for the whole read-modify-write, which makes them atomic with respect to
//! each other.

use std::collections::HashMap;

use async_trait::async_trait;
use coursetrack_core::{
    Answers, Assignment, AssignmentId, Course, CourseId, Grade, Lesson, LessonId, Progress,
    ProgressChange, Submission, SubmissionId, Time, User, UserId,
};
use tokio::sync::RwLock;
use tracing::debug;

use super::{Result, Storage, StorageError, SubmissionUpsert};

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    courses: HashMap<CourseId, Course>,
    lessons: HashMap<LessonId, Lesson>,
    assignments: HashMap<AssignmentId, Assignment>,
    progress: HashMap<(UserId, LessonId), Progress>,
    submissions: HashMap<SubmissionId, Submission>,
    submission_index: HashMap<(UserId, AssignmentId), SubmissionId>,
}

/// Volatile storage, used by tests and for ephemeral runs.
#[derive(Default)]
pub struct MemoryStorage {
    state: RwLock<State>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save_user(&self, user: &User) -> Result<()> {
        self.state.write().await.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn load_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.state.read().await.users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn save_course(&self, course: &Course) -> Result<()> {
        self.state
            .write()
            .await
            .courses
            .insert(course.id.clone(), course.clone());
        Ok(())
    }

    async fn load_course(&self, id: &CourseId) -> Result<Option<Course>> {
        Ok(self.state.read().await.courses.get(id).cloned())
    }

    async fn save_lesson(&self, lesson: &Lesson) -> Result<()> {
        self.state.write().await.lessons.insert(lesson.id, lesson.clone());
        Ok(())
    }

    async fn load_lesson(&self, id: LessonId) -> Result<Option<Lesson>> {
        Ok(self.state.read().await.lessons.get(&id).cloned())
    }

    async fn list_lessons(&self, course_id: &CourseId) -> Result<Vec<Lesson>> {
        let mut lessons: Vec<Lesson> = self
            .state
            .read()
            .await
            .lessons
            .values()
            .filter(|l| &l.course_id == course_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| (l.order, l.id));
        Ok(lessons)
    }

    async fn save_assignment(&self, assignment: &Assignment) -> Result<()> {
        self.state
            .write()
            .await
            .assignments
            .insert(assignment.id, assignment.clone());
        Ok(())
    }

    async fn load_assignment(&self, id: AssignmentId) -> Result<Option<Assignment>> {
        Ok(self.state.read().await.assignments.get(&id).cloned())
    }

    async fn list_assignments(&self, course_id: &CourseId) -> Result<Vec<Assignment>> {
        let mut assignments: Vec<Assignment> = self
            .state
            .read()
            .await
            .assignments
            .values()
            .filter(|a| &a.course_id == course_id)
            .cloned()
            .collect();
        assignments.sort_by_key(|a| a.id);
        Ok(assignments)
    }

    async fn load_progress(&self, user_id: UserId, lesson_id: LessonId) -> Result<Option<Progress>> {
        Ok(self
            .state
            .read()
            .await
            .progress
            .get(&(user_id, lesson_id))
            .cloned())
    }

    async fn list_progress(&self, user_id: UserId) -> Result<Vec<Progress>> {
        Ok(self
            .state
            .read()
            .await
            .progress
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn apply_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        change: ProgressChange,
        now: Time,
    ) -> Result<Progress> {
        let mut guard = self.state.write().await;
        let progress = guard
            .progress
            .entry((user_id, lesson_id))
            .or_insert_with(|| Progress::new(user_id, lesson_id, now));
        progress.apply(&change, now);
        debug!(%user_id, %lesson_id, ?change, "progress updated");
        Ok(progress.clone())
    }

    async fn load_submission(&self, id: SubmissionId) -> Result<Option<Submission>> {
        Ok(self.state.read().await.submissions.get(&id).cloned())
    }

    async fn find_submission(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
    ) -> Result<Option<Submission>> {
        let state = self.state.read().await;
        Ok(state
            .submission_index
            .get(&(user_id, assignment_id))
            .and_then(|id| state.submissions.get(id))
            .cloned())
    }

    async fn list_submissions(&self, assignment_id: AssignmentId) -> Result<Vec<Submission>> {
        let mut submissions: Vec<Submission> = self
            .state
            .read()
            .await
            .submissions
            .values()
            .filter(|s| s.assignment_id == assignment_id)
            .cloned()
            .collect();
        submissions.sort_by_key(|s| s.submitted_at);
        Ok(submissions)
    }

    async fn list_user_submissions(&self, user_id: UserId) -> Result<Vec<Submission>> {
        let mut submissions: Vec<Submission> = self
            .state
            .read()
            .await
            .submissions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        submissions.sort_by_key(|s| s.submitted_at);
        Ok(submissions)
    }

    async fn upsert_submission(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
        answers: &Answers,
        now: Time,
    ) -> Result<SubmissionUpsert> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        if let Some(submission) = state
            .submission_index
            .get(&(user_id, assignment_id))
            .and_then(|id| state.submissions.get_mut(id))
        {
            submission.resubmit(answers.clone(), now);
            return Ok(SubmissionUpsert {
                submission: submission.clone(),
                created: false,
            });
        }

        let submission = Submission::new(assignment_id, user_id, answers.clone(), now);
        state
            .submission_index
            .insert((user_id, assignment_id), submission.id);
        state.submissions.insert(submission.id, submission.clone());
        Ok(SubmissionUpsert {
            submission,
            created: true,
        })
    }

    async fn grade_submission(
        &self,
        id: SubmissionId,
        grade: &Grade,
        grader: UserId,
        now: Time,
    ) -> Result<Submission> {
        let mut guard = self.state.write().await;
        let submission = guard.submissions.get_mut(&id).ok_or_else(|| StorageError::NotFound {
            kind: "submission",
            id: id.to_string(),
        })?;
        submission.grade(grade, grader, now);
        Ok(submission.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursetrack_core::{AssignmentKind, ModuleId, Role};
    use std::sync::Arc;

    fn course() -> CourseId {
        CourseId::new("rust-101").unwrap()
    }

    #[tokio::test]
    async fn test_user_round_trip() {
        let storage = MemoryStorage::new();
        let user = User::new("Ada", Role::Learner).with_interests([course()]);
        storage.save_user(&user).await.unwrap();

        let loaded = storage.load_user(user.id).await.unwrap().unwrap();
        assert_eq!(loaded, user);
        assert!(storage.load_user(UserId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_lessons_sorted_by_order() {
        let storage = MemoryStorage::new();
        storage.save_lesson(&Lesson::new(course(), "Two", 2)).await.unwrap();
        storage.save_lesson(&Lesson::new(course(), "Zero", 0)).await.unwrap();
        storage
            .save_lesson(&Lesson::new(CourseId::new("other").unwrap(), "Elsewhere", 1))
            .await
            .unwrap();

        let lessons = storage.list_lessons(&course()).await.unwrap();
        let titles: Vec<&str> = lessons.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["Zero", "Two"]);
    }

    #[tokio::test]
    async fn test_concurrent_progress_changes_merge() {
        let storage = Arc::new(MemoryStorage::new());
        let user = UserId::new();
        let lesson = LessonId::new();
        let modules: Vec<ModuleId> = (0..16).map(|_| ModuleId::new()).collect();

        let mut handles = Vec::new();
        for module_id in modules.clone() {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move {
                storage
                    .apply_progress(
                        user,
                        lesson,
                        ProgressChange::Module { module_id, completed: true },
                        chrono::Utc::now(),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let progress = storage.load_progress(user, lesson).await.unwrap().unwrap();
        assert_eq!(progress.completed_modules.len(), modules.len());
    }

    #[tokio::test]
    async fn test_upsert_keeps_submission_id() {
        let storage = MemoryStorage::new();
        let assignment = Assignment::new(course(), "Essay", AssignmentKind::Essay, 10);
        let user = UserId::new();
        let now = chrono::Utc::now();
        let answers = Answers::Essay { text: "draft".to_string(), file_url: None };

        let first = storage.upsert_submission(user, assignment.id, &answers, now).await.unwrap();
        assert!(first.created);

        let second = storage
            .upsert_submission(user, assignment.id, &answers, now + chrono::Duration::minutes(5))
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(first.submission.id, second.submission.id);
        assert_eq!(storage.list_submissions(assignment.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_grade_missing_submission() {
        let storage = MemoryStorage::new();
        let err = storage
            .grade_submission(SubmissionId::new(), &Grade::default(), UserId::new(), chrono::Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { kind: "submission", .. }));
    }
}
