//! SQLite storage backend.
//!
//! Content entities (users, courses, lessons, assignments) are stored as JSON
//! documents in a generic `entities` table. Progress is normalized into a
//! `progress` row plus one `completed_modules` row per checked module, so a
//! toggle is a plain insert/delete inside a transaction and concurrent
//! toggles on different modules cannot overwrite each other.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use coursetrack_core::{
    Answers, Assignment, AssignmentId, Course, CourseId, Grade, Lesson, LessonId, ModuleId,
    Progress, ProgressChange, Submission, SubmissionId, Time, User, UserId,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection};
use tracing::debug;

use super::trait_::{Result, Storage, StorageError, SubmissionUpsert};

/// SQLite storage implementation.
#[derive(Clone)]
pub struct SqliteStorage {
    /// Database connection pool
    pool: sqlx::SqlitePool,
}

impl SqliteStorage {
    /// Open (creating if missing) a database file.
    pub async fn new_from_path(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create an in-memory SQLite storage for testing.
    ///
    /// Each connection to `:memory:` is its own database, so the pool is
    /// capped at one connection.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Initialize the database schema.
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS entities (
                id TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                parent TEXT,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (entity_type, id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_entities_parent ON entities(entity_type, parent)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS progress (
                user_id TEXT NOT NULL,
                lesson_id TEXT NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, lesson_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS completed_modules (
                user_id TEXT NOT NULL,
                lesson_id TEXT NOT NULL,
                module_id TEXT NOT NULL,
                PRIMARY KEY (user_id, lesson_id, module_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS submissions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                assignment_id TEXT NOT NULL,
                data TEXT NOT NULL,
                UNIQUE (user_id, assignment_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Check if the database is healthy.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    async fn save_entity<T: serde::Serialize>(
        &self,
        entity_type: &str,
        id: &str,
        parent: Option<&str>,
        value: &T,
    ) -> Result<()> {
        let data = serde_json::to_string(value)?;
        sqlx::query(
            "INSERT OR REPLACE INTO entities (id, entity_type, parent, data, updated_at)
            VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(entity_type)
        .bind(parent)
        .bind(data)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_entity<T: serde::de::DeserializeOwned>(
        &self,
        entity_type: &str,
        id: &str,
    ) -> Result<Option<T>> {
        let row = sqlx::query("SELECT data FROM entities WHERE entity_type = ? AND id = ?")
            .bind(entity_type)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| decode_data(&row)).transpose()
    }

    async fn list_entities<T: serde::de::DeserializeOwned>(
        &self,
        entity_type: &str,
        parent: Option<&str>,
    ) -> Result<Vec<T>> {
        let rows = match parent {
            Some(parent) => {
                sqlx::query("SELECT data FROM entities WHERE entity_type = ? AND parent = ? ORDER BY id")
                    .bind(entity_type)
                    .bind(parent)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT data FROM entities WHERE entity_type = ? ORDER BY id")
                    .bind(entity_type)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(decode_data).collect()
    }

    async fn list_submissions_where(&self, column: &str, value: String) -> Result<Vec<Submission>> {
        let sql = format!("SELECT data FROM submissions WHERE {} = ?", column);
        let rows = sqlx::query(&sql).bind(value).fetch_all(&self.pool).await?;
        let mut submissions: Vec<Submission> =
            rows.iter().map(decode_data).collect::<Result<_>>()?;
        submissions.sort_by_key(|s| s.submitted_at);
        Ok(submissions)
    }
}

fn decode_data<T: serde::de::DeserializeOwned>(row: &SqliteRow) -> Result<T> {
    let data: String = row.try_get("data")?;
    Ok(serde_json::from_str(&data)?)
}

fn parse_time(raw: &str) -> Result<Time> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&chrono::Utc))
        .map_err(|e| StorageError::Other(format!("bad timestamp {:?}: {}", raw, e)))
}

async fn read_progress(
    conn: &mut SqliteConnection,
    user_id: UserId,
    lesson_id: LessonId,
) -> Result<Option<Progress>> {
    let row = sqlx::query(
        "SELECT completed, updated_at FROM progress WHERE user_id = ? AND lesson_id = ?",
    )
    .bind(user_id.to_string())
    .bind(lesson_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let completed: bool = row.try_get("completed")?;
    let updated_at: String = row.try_get("updated_at")?;

    let module_rows = sqlx::query(
        "SELECT module_id FROM completed_modules WHERE user_id = ? AND lesson_id = ?",
    )
    .bind(user_id.to_string())
    .bind(lesson_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    let mut completed_modules = BTreeSet::new();
    for row in module_rows {
        let raw: String = row.try_get("module_id")?;
        let module_id: ModuleId = raw
            .parse()
            .map_err(|e| StorageError::Other(format!("bad module id {:?}: {}", raw, e)))?;
        completed_modules.insert(module_id);
    }

    Ok(Some(Progress {
        user_id,
        lesson_id,
        completed_modules,
        completed,
        updated_at: parse_time(&updated_at)?,
    }))
}

#[async_trait]
impl Storage for SqliteStorage {
    // === User operations ===

    async fn save_user(&self, user: &User) -> Result<()> {
        self.save_entity("user", &user.id.to_string(), None, user).await
    }

    async fn load_user(&self, id: UserId) -> Result<Option<User>> {
        self.load_entity("user", &id.to_string()).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.list_entities("user", None).await
    }

    // === Course content ===

    async fn save_course(&self, course: &Course) -> Result<()> {
        self.save_entity("course", course.id.as_str(), None, course).await
    }

    async fn load_course(&self, id: &CourseId) -> Result<Option<Course>> {
        self.load_entity("course", id.as_str()).await
    }

    async fn save_lesson(&self, lesson: &Lesson) -> Result<()> {
        self.save_entity(
            "lesson",
            &lesson.id.to_string(),
            Some(lesson.course_id.as_str()),
            lesson,
        )
        .await
    }

    async fn load_lesson(&self, id: LessonId) -> Result<Option<Lesson>> {
        self.load_entity("lesson", &id.to_string()).await
    }

    async fn list_lessons(&self, course_id: &CourseId) -> Result<Vec<Lesson>> {
        let mut lessons: Vec<Lesson> = self.list_entities("lesson", Some(course_id.as_str())).await?;
        lessons.sort_by_key(|l| (l.order, l.id));
        Ok(lessons)
    }

    async fn save_assignment(&self, assignment: &Assignment) -> Result<()> {
        self.save_entity(
            "assignment",
            &assignment.id.to_string(),
            Some(assignment.course_id.as_str()),
            assignment,
        )
        .await
    }

    async fn load_assignment(&self, id: AssignmentId) -> Result<Option<Assignment>> {
        self.load_entity("assignment", &id.to_string()).await
    }

    async fn list_assignments(&self, course_id: &CourseId) -> Result<Vec<Assignment>> {
        self.list_entities("assignment", Some(course_id.as_str())).await
    }

    // === Progress ===

    async fn load_progress(&self, user_id: UserId, lesson_id: LessonId) -> Result<Option<Progress>> {
        let mut conn = self.pool.acquire().await?;
        read_progress(&mut *conn, user_id, lesson_id).await
    }

    async fn list_progress(&self, user_id: UserId) -> Result<Vec<Progress>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query("SELECT lesson_id FROM progress WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_all(&mut *conn)
            .await?;

        let mut all = Vec::with_capacity(rows.len());
        for row in rows {
            let raw: String = row.try_get("lesson_id")?;
            let lesson_id: LessonId = raw
                .parse()
                .map_err(|e| StorageError::Other(format!("bad lesson id {:?}: {}", raw, e)))?;
            if let Some(progress) = read_progress(&mut *conn, user_id, lesson_id).await? {
                all.push(progress);
            }
        }
        Ok(all)
    }

    async fn apply_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        change: ProgressChange,
        now: Time,
    ) -> Result<Progress> {
        let user = user_id.to_string();
        let lesson = lesson_id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO progress (user_id, lesson_id, completed, updated_at) VALUES (?, ?, 0, ?)
            ON CONFLICT (user_id, lesson_id) DO UPDATE SET updated_at = excluded.updated_at",
        )
        .bind(&user)
        .bind(&lesson)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        match change {
            ProgressChange::Module { module_id, completed: true } => {
                sqlx::query(
                    "INSERT OR IGNORE INTO completed_modules (user_id, lesson_id, module_id)
                    VALUES (?, ?, ?)",
                )
                .bind(&user)
                .bind(&lesson)
                .bind(module_id.to_string())
                .execute(&mut *tx)
                .await?;
            }
            ProgressChange::Module { module_id, completed: false } => {
                sqlx::query(
                    "DELETE FROM completed_modules WHERE user_id = ? AND lesson_id = ? AND module_id = ?",
                )
                .bind(&user)
                .bind(&lesson)
                .bind(module_id.to_string())
                .execute(&mut *tx)
                .await?;
            }
            ProgressChange::Lesson { completed } => {
                sqlx::query("UPDATE progress SET completed = ? WHERE user_id = ? AND lesson_id = ?")
                    .bind(completed)
                    .bind(&user)
                    .bind(&lesson)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let progress = read_progress(&mut *tx, user_id, lesson_id)
            .await?
            .ok_or_else(|| StorageError::Other("progress row vanished inside transaction".to_string()))?;
        tx.commit().await?;

        debug!(%user_id, %lesson_id, ?change, "progress committed");
        Ok(progress)
    }

    // === Submissions ===

    async fn load_submission(&self, id: SubmissionId) -> Result<Option<Submission>> {
        let row = sqlx::query("SELECT data FROM submissions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| decode_data(&row)).transpose()
    }

    async fn find_submission(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
    ) -> Result<Option<Submission>> {
        let row = sqlx::query("SELECT data FROM submissions WHERE user_id = ? AND assignment_id = ?")
            .bind(user_id.to_string())
            .bind(assignment_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| decode_data(&row)).transpose()
    }

    async fn list_submissions(&self, assignment_id: AssignmentId) -> Result<Vec<Submission>> {
        self.list_submissions_where("assignment_id", assignment_id.to_string())
            .await
    }

    async fn list_user_submissions(&self, user_id: UserId) -> Result<Vec<Submission>> {
        self.list_submissions_where("user_id", user_id.to_string()).await
    }

    async fn upsert_submission(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
        answers: &Answers,
        now: Time,
    ) -> Result<SubmissionUpsert> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT data FROM submissions WHERE user_id = ? AND assignment_id = ?")
            .bind(user_id.to_string())
            .bind(assignment_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        let existing: Option<Submission> = row.map(|row| decode_data(&row)).transpose()?;

        let upsert = match existing {
            Some(mut submission) => {
                submission.resubmit(answers.clone(), now);
                sqlx::query("UPDATE submissions SET data = ? WHERE id = ?")
                    .bind(serde_json::to_string(&submission)?)
                    .bind(submission.id.to_string())
                    .execute(&mut *tx)
                    .await?;
                SubmissionUpsert {
                    submission,
                    created: false,
                }
            }
            None => {
                let submission = Submission::new(assignment_id, user_id, answers.clone(), now);
                sqlx::query(
                    "INSERT INTO submissions (id, user_id, assignment_id, data) VALUES (?, ?, ?, ?)",
                )
                .bind(submission.id.to_string())
                .bind(user_id.to_string())
                .bind(assignment_id.to_string())
                .bind(serde_json::to_string(&submission)?)
                .execute(&mut *tx)
                .await?;
                SubmissionUpsert {
                    submission,
                    created: true,
                }
            }
        };

        tx.commit().await?;
        Ok(upsert)
    }

    async fn grade_submission(
        &self,
        id: SubmissionId,
        grade: &Grade,
        grader: UserId,
        now: Time,
    ) -> Result<Submission> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT data FROM submissions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        let mut submission: Submission = match row {
            Some(row) => decode_data(&row)?,
            None => {
                return Err(StorageError::NotFound {
                    kind: "submission",
                    id: id.to_string(),
                })
            }
        };

        submission.grade(grade, grader, now);
        sqlx::query("UPDATE submissions SET data = ? WHERE id = ?")
            .bind(serde_json::to_string(&submission)?)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(submission)
    }
}
