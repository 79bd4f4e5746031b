//! JSON file storage implementation.
//!
//! Stores each entity as a JSON file under a root directory (by default
//! `.coursetrack/`). Files are written to a uniquely named temporary sibling
//! and renamed into place, so a failed write never leaves a half-written
//! record behind. Read-modify-write operations hold an in-process mutex and
//! an exclusive advisory lock on `<root>/.lock`, which serializes them across
//! every process sharing the directory.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use coursetrack_core::{
    Answers, Assignment, AssignmentId, Course, CourseId, Grade, Lesson, LessonId, Progress,
    ProgressChange, Submission, SubmissionId, Time, User, UserId,
};
use fs4::fs_std::FileExt;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Result, Storage, StorageError, SubmissionUpsert};

/// Name of the lock file under the store root.
pub const LOCK_FILE: &str = ".lock";

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
    writer: Mutex<()>,
}

impl JsonStorage {
    /// Create storage, creating the subdirectories it needs.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("users")).await?;
        fs::create_dir_all(root.join("courses")).await?;
        fs::create_dir_all(root.join("lessons")).await?;
        fs::create_dir_all(root.join("assignments")).await?;
        fs::create_dir_all(root.join("progress")).await?;
        fs::create_dir_all(root.join("submissions")).await?;

        Ok(Self {
            root,
            writer: Mutex::new(()),
        })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Take the cross-process writer lock. Released when the file is dropped.
    async fn lock_dir(&self) -> Result<File> {
        let path = self.root.join(LOCK_FILE);
        blocking(move || {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
    }

    fn user_path(&self, id: UserId) -> PathBuf {
        self.root.join("users").join(format!("{}.json", id))
    }
    fn course_path(&self, id: &CourseId) -> PathBuf {
        self.root.join("courses").join(format!("{}.json", id))
    }
    fn lesson_path(&self, id: LessonId) -> PathBuf {
        self.root.join("lessons").join(format!("{}.json", id))
    }
    fn assignment_path(&self, id: AssignmentId) -> PathBuf {
        self.root.join("assignments").join(format!("{}.json", id))
    }
    fn progress_path(&self, user_id: UserId, lesson_id: LessonId) -> PathBuf {
        self.root
            .join("progress")
            .join(format!("{}_{}.json", user_id, lesson_id))
    }
    fn submission_path(&self, user_id: UserId, assignment_id: AssignmentId) -> PathBuf {
        self.root
            .join("submissions")
            .join(format!("{}_{}.json", user_id, assignment_id))
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn save_user(&self, user: &User) -> Result<()> {
        write_json(&self.user_path(user.id), user).await
    }

    async fn load_user(&self, id: UserId) -> Result<Option<User>> {
        read_json(&self.user_path(id)).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = list_dir(&self.root.join("users")).await?;
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn save_course(&self, course: &Course) -> Result<()> {
        write_json(&self.course_path(&course.id), course).await
    }

    async fn load_course(&self, id: &CourseId) -> Result<Option<Course>> {
        read_json(&self.course_path(id)).await
    }

    async fn save_lesson(&self, lesson: &Lesson) -> Result<()> {
        write_json(&self.lesson_path(lesson.id), lesson).await
    }

    async fn load_lesson(&self, id: LessonId) -> Result<Option<Lesson>> {
        read_json(&self.lesson_path(id)).await
    }

    async fn list_lessons(&self, course_id: &CourseId) -> Result<Vec<Lesson>> {
        let all: Vec<Lesson> = list_dir(&self.root.join("lessons")).await?;
        let mut lessons: Vec<Lesson> = all
            .into_iter()
            .filter(|l| &l.course_id == course_id)
            .collect();
        lessons.sort_by_key(|l| (l.order, l.id));
        Ok(lessons)
    }

    async fn save_assignment(&self, assignment: &Assignment) -> Result<()> {
        write_json(&self.assignment_path(assignment.id), assignment).await
    }

    async fn load_assignment(&self, id: AssignmentId) -> Result<Option<Assignment>> {
        read_json(&self.assignment_path(id)).await
    }

    async fn list_assignments(&self, course_id: &CourseId) -> Result<Vec<Assignment>> {
        let all: Vec<Assignment> = list_dir(&self.root.join("assignments")).await?;
        let mut assignments: Vec<Assignment> = all
            .into_iter()
            .filter(|a| &a.course_id == course_id)
            .collect();
        assignments.sort_by_key(|a| a.id);
        Ok(assignments)
    }

    async fn load_progress(&self, user_id: UserId, lesson_id: LessonId) -> Result<Option<Progress>> {
        read_json(&self.progress_path(user_id, lesson_id)).await
    }

    async fn list_progress(&self, user_id: UserId) -> Result<Vec<Progress>> {
        let all: Vec<Progress> = list_dir(&self.root.join("progress")).await?;
        Ok(all.into_iter().filter(|p| p.user_id == user_id).collect())
    }

    async fn apply_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        change: ProgressChange,
        now: Time,
    ) -> Result<Progress> {
        let _guard = self.writer.lock().await;
        let _dir = self.lock_dir().await?;
        let path = self.progress_path(user_id, lesson_id);

        let mut progress = read_json(&path)
            .await?
            .unwrap_or_else(|| Progress::new(user_id, lesson_id, now));
        progress.apply(&change, now);
        write_json(&path, &progress).await?;

        debug!(%user_id, %lesson_id, ?change, "progress written");
        Ok(progress)
    }

    async fn load_submission(&self, id: SubmissionId) -> Result<Option<Submission>> {
        let all: Vec<Submission> = list_dir(&self.root.join("submissions")).await?;
        Ok(all.into_iter().find(|s| s.id == id))
    }

    async fn find_submission(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
    ) -> Result<Option<Submission>> {
        read_json(&self.submission_path(user_id, assignment_id)).await
    }

    async fn list_submissions(&self, assignment_id: AssignmentId) -> Result<Vec<Submission>> {
        let all: Vec<Submission> = list_dir(&self.root.join("submissions")).await?;
        let mut submissions: Vec<Submission> = all
            .into_iter()
            .filter(|s| s.assignment_id == assignment_id)
            .collect();
        submissions.sort_by_key(|s| s.submitted_at);
        Ok(submissions)
    }

    async fn list_user_submissions(&self, user_id: UserId) -> Result<Vec<Submission>> {
        let all: Vec<Submission> = list_dir(&self.root.join("submissions")).await?;
        let mut submissions: Vec<Submission> =
            all.into_iter().filter(|s| s.user_id == user_id).collect();
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
        let _guard = self.writer.lock().await;
        let _dir = self.lock_dir().await?;
        let path = self.submission_path(user_id, assignment_id);

        let upsert = match read_json::<Submission>(&path).await? {
            Some(mut submission) => {
                submission.resubmit(answers.clone(), now);
                SubmissionUpsert {
                    submission,
                    created: false,
                }
            }
            None => SubmissionUpsert {
                submission: Submission::new(assignment_id, user_id, answers.clone(), now),
                created: true,
            },
        };
        write_json(&path, &upsert.submission).await?;
        Ok(upsert)
    }

    async fn grade_submission(
        &self,
        id: SubmissionId,
        grade: &Grade,
        grader: UserId,
        now: Time,
    ) -> Result<Submission> {
        let _guard = self.writer.lock().await;
        let _dir = self.lock_dir().await?;

        let mut submission = self
            .load_submission(id)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                kind: "submission",
                id: id.to_string(),
            })?;
        submission.grade(grade, grader, now);
        write_json(
            &self.submission_path(submission.user_id, submission.assignment_id),
            &submission,
        )
        .await?;
        Ok(submission)
    }
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    let path = path.to_path_buf();
    blocking(move || {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> std::io::Result<T> + Send + 'static,
{
    let value = tokio::task::spawn_blocking(f)
        .await
        .map_err(std::io::Error::other)??;
    Ok(value)
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        if let Some(item) = read_json(&entry.path()).await? {
            items.push(item);
        }
    }
    Ok(items)
}
