//! Submission lifecycle across services and backends.

use std::sync::Arc;

use chrono::Duration;
use coursetrack_assessment::{
    AssessmentConfig, BasicSubmissionManager, RecordingEventSink, SubmissionManager,
};
use coursetrack_core::{
    Answers, Assignment, AssignmentKind, CourseId, Grade, LearnError, LearningEvent, Role,
    SubmissionStatus, User,
};
use coursetrack_progress::{BasicProgressTracker, ProgressTracker};
use coursetrack_storage::{JsonStorage, MemoryStorage, Storage};

struct World {
    storage: Arc<dyn Storage>,
    learner: User,
    tutor: User,
    essay: Assignment,
}

async fn world(storage: Arc<dyn Storage>) -> World {
    let course = CourseId::new("writing-201").unwrap();
    let learner = User::new("Ada", Role::Learner).with_interests([course.clone()]);
    let tutor = User::new("Grace", Role::Tutor).with_interests([course.clone()]);
    let essay = Assignment::new(course, "On ownership", AssignmentKind::Essay, 20)
        .due(chrono::Utc::now() + Duration::days(7))
        .accepting(["pdf", "md"]);

    storage.save_user(&learner).await.unwrap();
    storage.save_user(&tutor).await.unwrap();
    storage.save_assignment(&essay).await.unwrap();

    World { storage, learner, tutor, essay }
}

fn essay(text: &str) -> Answers {
    Answers::Essay { text: text.to_string(), file_url: None }
}

#[tokio::test]
async fn resubmitting_graded_work_keeps_the_grade() {
    let w = world(Arc::new(MemoryStorage::new())).await;
    let manager = BasicSubmissionManager::new(w.storage.clone());
    let t0 = chrono::Utc::now();
    let learner = w.learner.actor();

    let first = manager.submit_assignment(&learner, w.essay.id, essay("draft"), t0).await.unwrap();
    manager
        .grade_submission(
            &w.tutor.actor(),
            first.id,
            Grade { score: Some(15), feedback: Some("expand section 2".to_string()) },
            t0 + Duration::hours(1),
        )
        .await
        .unwrap();

    let t2 = t0 + Duration::hours(2);
    let second = manager.submit_assignment(&learner, w.essay.id, essay("final"), t2).await.unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.submitted_at, t2);
    assert_eq!(second.score, Some(15));
    assert_eq!(second.feedback.as_deref(), Some("expand section 2"));
    assert_eq!(
        manager.submission_status(&learner, w.essay.id, t2).await.unwrap(),
        SubmissionStatus::Graded
    );
}

#[tokio::test]
async fn status_follows_the_clock_and_the_lifecycle() {
    let w = world(Arc::new(MemoryStorage::new())).await;
    let manager = BasicSubmissionManager::new(w.storage.clone());
    let learner = w.learner.actor();
    let due = w.essay.due_date.unwrap();

    let before = due - Duration::hours(1);
    let after = due + Duration::hours(1);
    assert_eq!(
        manager.submission_status(&learner, w.essay.id, before).await.unwrap(),
        SubmissionStatus::Pending
    );
    assert_eq!(
        manager.submission_status(&learner, w.essay.id, after).await.unwrap(),
        SubmissionStatus::Overdue
    );

    let late = manager.submit_assignment(&learner, w.essay.id, essay("late"), after).await.unwrap();
    assert_eq!(
        manager.submission_status(&learner, w.essay.id, after).await.unwrap(),
        SubmissionStatus::Submitted
    );

    manager
        .grade_submission(&w.tutor.actor(), late.id, Grade { score: Some(0), feedback: None }, after)
        .await
        .unwrap();
    assert_eq!(
        manager.submission_status_for(&w.tutor.actor(), w.essay.id, w.learner.id, after).await.unwrap(),
        SubmissionStatus::Graded
    );
}

#[tokio::test]
async fn removing_interest_revokes_submission_access() {
    let w = world(Arc::new(MemoryStorage::new())).await;
    let manager = BasicSubmissionManager::new(w.storage.clone());
    let now = chrono::Utc::now();

    let submission = manager
        .submit_assignment(&w.learner.actor(), w.essay.id, essay("text"), now)
        .await
        .unwrap();
    assert!(manager.view_submission(&w.learner.actor(), submission.id).await.is_ok());

    let mut learner = w.learner.clone();
    learner.remove_interest(&w.essay.course_id);
    w.storage.save_user(&learner).await.unwrap();

    let err = manager.view_submission(&learner.actor(), submission.id).await.unwrap_err();
    assert!(matches!(err, LearnError::AccessDenied(_)));

    let err = manager
        .list_assignments(&learner.actor(), &w.essay.course_id, now)
        .await
        .unwrap_err();
    assert!(matches!(err, LearnError::AccessDenied(_)));

    let tracker = BasicProgressTracker::new(w.storage.clone());
    let err = tracker
        .get_course_progress(&learner.actor(), &w.essay.course_id)
        .await
        .unwrap_err();
    assert!(matches!(err, LearnError::AccessDenied(_)));

    let err = manager
        .submit_assignment(&learner.actor(), w.essay.id, essay("again"), now)
        .await
        .unwrap_err();
    assert!(matches!(err, LearnError::AccessDenied(_)));
}

#[tokio::test]
async fn tutor_loses_grading_rights_with_interest() {
    let w = world(Arc::new(MemoryStorage::new())).await;
    let manager = BasicSubmissionManager::new(w.storage.clone());
    let now = chrono::Utc::now();

    let submission = manager
        .submit_assignment(&w.learner.actor(), w.essay.id, essay("text"), now)
        .await
        .unwrap();

    let mut tutor = w.tutor.clone();
    tutor.remove_interest(&w.essay.course_id);
    w.storage.save_user(&tutor).await.unwrap();

    let err = manager
        .grade_submission(&tutor.actor(), submission.id, Grade { score: Some(1), feedback: None }, now)
        .await
        .unwrap_err();
    assert!(matches!(err, LearnError::AccessDenied(_)));
}

#[tokio::test]
async fn grading_unknown_submission_is_not_found() {
    let w = world(Arc::new(MemoryStorage::new())).await;
    let manager = BasicSubmissionManager::new(w.storage.clone());

    let err = manager
        .grade_submission(
            &w.tutor.actor(),
            coursetrack_core::SubmissionId::new(),
            Grade { score: Some(1), feedback: None },
            chrono::Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LearnError::NotFound { kind: "submission", .. }));
}

#[tokio::test]
async fn rejected_upload_format_is_validation() {
    let w = world(Arc::new(MemoryStorage::new())).await;
    let manager = BasicSubmissionManager::new(w.storage.clone());

    let err = manager
        .submit_assignment(
            &w.learner.actor(),
            w.essay.id,
            Answers::Essay {
                text: String::new(),
                file_url: Some("https://files.example/essay.docx".to_string()),
            },
            chrono::Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LearnError::Validation(msg) if msg.contains(".docx")));
}

#[tokio::test]
async fn lifecycle_survives_reopening_json_store() {
    let dir = tempfile::tempdir().unwrap();
    let now = chrono::Utc::now();
    let events = Arc::new(RecordingEventSink::new());

    let (learner, essay_id, submission_id) = {
        let storage: Arc<dyn Storage> = Arc::new(JsonStorage::new(dir.path()).await.unwrap());
        let w = world(storage.clone()).await;
        let manager = BasicSubmissionManager::new(storage).with_events(events.clone());
        let submission = manager
            .submit_assignment(&w.learner.actor(), w.essay.id, essay("persisted"), now)
            .await
            .unwrap();
        manager
            .grade_submission(&w.tutor.actor(), submission.id, Grade { score: None, feedback: Some("good".to_string()) }, now)
            .await
            .unwrap();
        (w.learner, w.essay.id, submission.id)
    };

    let reopened: Arc<dyn Storage> = Arc::new(JsonStorage::new(dir.path()).await.unwrap());
    let manager = BasicSubmissionManager::new(reopened);
    let submission = manager.view_submission(&learner.actor(), submission_id).await.unwrap();
    assert_eq!(submission.assignment_id, essay_id);
    assert_eq!(submission.feedback.as_deref(), Some("good"));
    assert!(submission.is_graded());

    let names: Vec<_> = events.events().iter().map(LearningEvent::name).collect();
    assert_eq!(names, vec!["submission_created", "submission_graded"]);
}

#[tokio::test]
async fn closing_soon_window_is_configurable() {
    let w = world(Arc::new(MemoryStorage::new())).await;
    let now = chrono::Utc::now();

    let narrow = BasicSubmissionManager::new(w.storage.clone())
        .with_config(AssessmentConfig::with_closing_soon_hours(24).unwrap());
    let wide = BasicSubmissionManager::new(w.storage.clone())
        .with_config(AssessmentConfig::with_closing_soon_hours(24 * 8).unwrap());

    let course = &w.essay.course_id;
    let narrow_view = narrow.list_assignments(&w.learner.actor(), course, now).await.unwrap();
    let wide_view = wide.list_assignments(&w.learner.actor(), course, now).await.unwrap();
    assert!(!narrow_view[0].closing_soon);
    assert!(wide_view[0].closing_soon);
}
