//! End-to-end progress behavior across backends and store failures.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use coursetrack_core::{
    Answers, Assignment, AssignmentId, Course, CourseId, Grade, LearnError, Lesson, LessonId,
    Progress, ProgressChange, Role, Submission, SubmissionId, Time, User, UserId,
};
use coursetrack_progress::{BasicProgressTracker, ProgressTracker};
use coursetrack_storage::{
    JsonStorage, MemoryStorage, Result, Storage, StorageError, SubmissionUpsert,
};

/// Memory store that can be told to fail reads or writes.
#[derive(Default)]
struct FlakyStorage {
    inner: MemoryStorage,
    failing_reads: AtomicUsize,
    failing_writes: AtomicBool,
}

impl FlakyStorage {
    fn fail_reads(&self, n: usize) {
        self.failing_reads.store(n, Ordering::SeqCst);
    }

    fn fail_writes(&self, on: bool) {
        self.failing_writes.store(on, Ordering::SeqCst);
    }

    fn read_gate(&self) -> Result<()> {
        let left = self.failing_reads.load(Ordering::SeqCst);
        if left > 0 {
            self.failing_reads.store(left - 1, Ordering::SeqCst);
            return Err(StorageError::Database("connection reset".to_string()));
        }
        Ok(())
    }

    fn write_gate(&self) -> Result<()> {
        if self.failing_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Database("disk full".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for FlakyStorage {
    async fn save_user(&self, user: &User) -> Result<()> {
        self.inner.save_user(user).await
    }
    async fn load_user(&self, id: UserId) -> Result<Option<User>> {
        self.read_gate()?;
        self.inner.load_user(id).await
    }
    async fn list_users(&self) -> Result<Vec<User>> {
        self.inner.list_users().await
    }
    async fn save_course(&self, course: &Course) -> Result<()> {
        self.inner.save_course(course).await
    }
    async fn load_course(&self, id: &CourseId) -> Result<Option<Course>> {
        self.inner.load_course(id).await
    }
    async fn save_lesson(&self, lesson: &Lesson) -> Result<()> {
        self.inner.save_lesson(lesson).await
    }
    async fn load_lesson(&self, id: LessonId) -> Result<Option<Lesson>> {
        self.read_gate()?;
        self.inner.load_lesson(id).await
    }
    async fn list_lessons(&self, course_id: &CourseId) -> Result<Vec<Lesson>> {
        self.inner.list_lessons(course_id).await
    }
    async fn save_assignment(&self, assignment: &Assignment) -> Result<()> {
        self.inner.save_assignment(assignment).await
    }
    async fn load_assignment(&self, id: AssignmentId) -> Result<Option<Assignment>> {
        self.inner.load_assignment(id).await
    }
    async fn list_assignments(&self, course_id: &CourseId) -> Result<Vec<Assignment>> {
        self.inner.list_assignments(course_id).await
    }
    async fn load_progress(&self, user_id: UserId, lesson_id: LessonId) -> Result<Option<Progress>> {
        self.read_gate()?;
        self.inner.load_progress(user_id, lesson_id).await
    }
    async fn list_progress(&self, user_id: UserId) -> Result<Vec<Progress>> {
        self.inner.list_progress(user_id).await
    }
    async fn apply_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        change: ProgressChange,
        now: Time,
    ) -> Result<Progress> {
        self.write_gate()?;
        self.inner.apply_progress(user_id, lesson_id, change, now).await
    }
    async fn load_submission(&self, id: SubmissionId) -> Result<Option<Submission>> {
        self.inner.load_submission(id).await
    }
    async fn find_submission(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
    ) -> Result<Option<Submission>> {
        self.inner.find_submission(user_id, assignment_id).await
    }
    async fn list_submissions(&self, assignment_id: AssignmentId) -> Result<Vec<Submission>> {
        self.inner.list_submissions(assignment_id).await
    }
    async fn list_user_submissions(&self, user_id: UserId) -> Result<Vec<Submission>> {
        self.inner.list_user_submissions(user_id).await
    }
    async fn upsert_submission(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
        answers: &Answers,
        now: Time,
    ) -> Result<SubmissionUpsert> {
        self.write_gate()?;
        self.inner.upsert_submission(user_id, assignment_id, answers, now).await
    }
    async fn grade_submission(
        &self,
        id: SubmissionId,
        grade: &Grade,
        grader: UserId,
        now: Time,
    ) -> Result<Submission> {
        self.write_gate()?;
        self.inner.grade_submission(id, grade, grader, now).await
    }
}

async fn seed(storage: &dyn Storage, modules: usize) -> (User, Lesson) {
    let course = CourseId::new("rust-101").unwrap();
    let learner = User::new("Ada", Role::Learner).with_interests([course.clone()]);
    let mut lesson = Lesson::new(course.clone(), "Ownership", 0);
    for i in 0..modules {
        lesson = lesson.with_module(format!("Part {}", i + 1));
    }
    storage.save_user(&learner).await.unwrap();
    storage.save_course(&Course::new(course, "Rust 101")).await.unwrap();
    storage.save_lesson(&lesson).await.unwrap();
    (learner, lesson)
}

#[tokio::test]
async fn concurrent_toggles_keep_every_module() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(JsonStorage::new(dir.path()).await.unwrap());
    let (learner, lesson) = seed(storage.as_ref(), 8).await;
    let tracker = BasicProgressTracker::new(storage.clone());
    let now = chrono::Utc::now();

    let handles: Vec<_> = lesson
        .modules
        .iter()
        .map(|module| {
            let tracker = tracker.clone();
            let actor = learner.actor();
            let (lesson_id, module_id) = (lesson.id, module.id);
            tokio::spawn(async move {
                tracker.toggle_module(&actor, lesson_id, module_id, true, now).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let view = tracker.get_lesson_progress(&learner.actor(), lesson.id).await.unwrap();
    assert_eq!(view.completed_modules.len(), 8);
    assert_eq!(view.percentage, 100);
}

#[tokio::test]
async fn half_the_modules_is_fifty_percent() {
    let storage = Arc::new(MemoryStorage::new());
    let (learner, lesson) = seed(storage.as_ref(), 4).await;
    let tracker = BasicProgressTracker::new(storage.clone());
    let actor = learner.actor();
    let now = chrono::Utc::now();

    for module in lesson.modules.iter().take(2) {
        tracker.toggle_module(&actor, lesson.id, module.id, true, now).await.unwrap();
    }

    let lesson_view = tracker.get_lesson_progress(&actor, lesson.id).await.unwrap();
    assert_eq!(lesson_view.percentage, 50);
    assert!(!lesson_view.completed);

    let course_view = tracker.get_course_progress(&actor, &lesson.course_id).await.unwrap();
    assert_eq!(course_view.percentage, 0);

    tracker.set_lesson_completed(&actor, lesson.id, true, now).await.unwrap();
    let course_view = tracker.get_course_progress(&actor, &lesson.course_id).await.unwrap();
    assert_eq!(course_view.percentage, 100);
}

#[tokio::test]
async fn failed_write_leaves_progress_untouched() {
    let storage = Arc::new(FlakyStorage::default());
    let (learner, lesson) = seed(storage.as_ref(), 2).await;
    let tracker = BasicProgressTracker::new(storage.clone());
    let actor = learner.actor();
    let now = chrono::Utc::now();

    tracker.toggle_module(&actor, lesson.id, lesson.modules[0].id, true, now).await.unwrap();

    storage.fail_writes(true);
    let err = tracker
        .toggle_module(&actor, lesson.id, lesson.modules[1].id, true, now)
        .await
        .unwrap_err();
    assert!(matches!(err, LearnError::Persistence(_)));
    storage.fail_writes(false);

    let view = tracker.get_lesson_progress(&actor, lesson.id).await.unwrap();
    assert_eq!(view.completed_modules.len(), 1);
    assert!(view.completed_modules.contains(&lesson.modules[0].id));
}

#[tokio::test]
async fn transient_read_failure_is_retried() {
    let storage = Arc::new(FlakyStorage::default());
    let (learner, lesson) = seed(storage.as_ref(), 1).await;
    let tracker = BasicProgressTracker::new(storage.clone());

    storage.fail_reads(1);
    let view = tracker.get_lesson_progress(&learner.actor(), lesson.id).await.unwrap();
    assert_eq!(view.percentage, 0);

    storage.fail_reads(2);
    let err = tracker
        .get_lesson_progress(&learner.actor(), lesson.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LearnError::Persistence(_)));
}

#[tokio::test]
async fn revoked_interest_blocks_progress_reads() {
    let storage = Arc::new(MemoryStorage::new());
    let (mut learner, lesson) = seed(storage.as_ref(), 1).await;
    let tracker = BasicProgressTracker::new(storage.clone());
    let now = chrono::Utc::now();

    tracker
        .toggle_module(&learner.actor(), lesson.id, lesson.modules[0].id, true, now)
        .await
        .unwrap();

    learner.remove_interest(&lesson.course_id);
    storage.save_user(&learner).await.unwrap();

    let err = tracker
        .get_lesson_progress(&learner.actor(), lesson.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LearnError::AccessDenied(_)));
}
