//! coursetrack CLI - learner progress and assessment tracking.

mod config;
mod seed;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coursetrack_assessment::{
    checked_score, BasicSubmissionManager, SubmissionManager,
};
use coursetrack_core::{
    parse_id, Actor, Answers, AssignmentId, AssignmentKind, CourseId, Grade, LearnError,
    LessonId, ModuleId, SubmissionId, Time, UserId,
};
use coursetrack_dashboard::{BasicDashboard, Dashboard};
use coursetrack_progress::{BasicProgressTracker, ProgressTracker};
use coursetrack_storage::{JsonStorage, MemoryStorage, Storage};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{load_config_from, Backend, CourseTrackConfig};
use seed::Fixture;

#[derive(Parser)]
#[command(name = "coursetrack")]
#[command(about = "Track course progress, submissions and grades", long_about = None)]
struct Cli {
    /// Config file (defaults to ./coursetrack.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Storage directory, overrides the config file
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Storage backend, overrides the config file
    #[arg(long, global = true, value_enum)]
    backend: Option<Backend>,

    /// Acting user ID
    #[arg(long, global = true, env = "COURSETRACK_USER")]
    user: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load users, courses, lessons and assignments from a JSON fixture
    Seed {
        /// Fixture file
        file: PathBuf,
    },
    /// Check a module off (or back on with --off)
    Toggle {
        /// Lesson ID
        lesson: String,
        /// Module ID
        module: String,
        /// Mark the module as not completed
        #[arg(long)]
        off: bool,
    },
    /// Mark a lesson completed (or not, with --undo)
    Complete {
        /// Lesson ID
        lesson: String,
        /// Clear the lesson-level flag
        #[arg(long)]
        undo: bool,
    },
    /// Show progress through a lesson
    Lesson {
        /// Lesson ID
        lesson: String,
    },
    /// Show a course outline with progress
    Course {
        /// Course slug
        course: String,
    },
    /// List a course's assignments with their status
    Assignments {
        /// Course slug
        course: String,
    },
    /// Submit (or resubmit) answers for an assignment
    Submit {
        /// Assignment ID
        assignment: String,
        /// Essay text
        #[arg(long)]
        text: Option<String>,
        /// Uploaded file URL
        #[arg(long)]
        file: Option<String>,
        /// Notes for the tutor
        #[arg(long)]
        notes: Option<String>,
        /// Quiz answer, repeat once per question
        #[arg(long = "answer")]
        answers: Vec<String>,
    },
    /// Grade a submission
    Grade {
        /// Submission ID
        submission: String,
        /// Score
        #[arg(long, allow_negative_numbers = true)]
        score: Option<i64>,
        /// Feedback
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Show the status of an assignment
    Status {
        /// Assignment ID
        assignment: String,
        /// Learner to inspect (tutors only); defaults to the acting user
        #[arg(long = "of")]
        of: Option<String>,
    },
    /// Show a submission
    Show {
        /// Submission ID
        submission: String,
    },
    /// List submissions awaiting review in a course
    Review {
        /// Course slug
        course: String,
    },
    /// Show the learner dashboard
    Dashboard,
}

/// Services wired over one store.
struct App {
    storage: Arc<dyn Storage>,
    tracker: BasicProgressTracker,
    submissions: BasicSubmissionManager,
    dashboard: BasicDashboard,
    json: bool,
}

impl App {
    fn new(storage: Arc<dyn Storage>, config: &CourseTrackConfig, json: bool) -> Result<Self> {
        let assessment = config.assessment()?;
        Ok(Self {
            tracker: BasicProgressTracker::new(storage.clone()),
            submissions: BasicSubmissionManager::new(storage.clone()).with_config(assessment),
            dashboard: BasicDashboard::new(storage.clone()).with_config(assessment),
            storage,
            json,
        })
    }

    /// Resolve `--user` into the actor the services run as.
    async fn actor(&self, raw: Option<&str>) -> Result<Actor> {
        let raw = raw.context("this command needs --user <ID> (or COURSETRACK_USER)")?;
        let user_id: UserId = parse_id("user", raw)?;
        let user = self
            .storage
            .load_user(user_id)
            .await?
            .ok_or_else(|| LearnError::not_found("user", user_id))?;
        Ok(user.actor())
    }

    fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human(value);
        }
        Ok(())
    }
}

async fn open_storage(config: &CourseTrackConfig) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.backend {
        Backend::Memory => {
            warn!("memory backend selected; nothing will be kept after exit");
            Arc::new(MemoryStorage::new())
        }
        Backend::Json => Arc::new(
            JsonStorage::new(&config.storage_path)
                .await
                .with_context(|| format!("failed to open {}", config.storage_path.display()))?,
        ),
        Backend::Sqlite => open_sqlite(config).await?,
    };
    Ok(storage)
}

#[cfg(feature = "sqlite")]
async fn open_sqlite(config: &CourseTrackConfig) -> Result<Arc<dyn Storage>> {
    std::fs::create_dir_all(&config.storage_path)?;
    let path = config.storage_path.join("coursetrack.db");
    let storage = coursetrack_storage::SqliteStorage::new_from_path(&path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    Ok(Arc::new(storage))
}

#[cfg(not(feature = "sqlite"))]
async fn open_sqlite(_config: &CourseTrackConfig) -> Result<Arc<dyn Storage>> {
    anyhow::bail!("this build has no sqlite support; rebuild with --features sqlite")
}

fn format_due(due: Option<Time>) -> String {
    due.map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "no due date".to_string())
}

fn build_answers(
    kind: AssignmentKind,
    text: Option<String>,
    file: Option<String>,
    notes: Option<String>,
    answers: Vec<String>,
) -> Answers {
    match kind {
        AssignmentKind::Essay => Answers::Essay {
            text: text.unwrap_or_default(),
            file_url: file,
        },
        AssignmentKind::Quiz => Answers::Quiz { answers },
        AssignmentKind::Coding => Answers::Coding {
            file_url: file,
            notes,
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config_from(cli.config.as_deref())?;
    if let Some(path) = &cli.storage {
        config.storage_path = path.clone();
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let storage = open_storage(&config).await?;
    let app = App::new(storage, &config, cli.json)?;
    let user = cli.user.as_deref();
    let now = chrono::Utc::now();

    match cli.command {
        Commands::Seed { file } => {
            let report = Fixture::load(&file)?.apply(app.storage.as_ref()).await?;
            info!(?report, "fixture loaded");
            println!(
                "Seeded {} users, {} courses, {} lessons, {} assignments",
                report.users, report.courses, report.lessons, report.assignments
            );
        }
        Commands::Toggle { lesson, module, off } => {
            let actor = app.actor(user).await?;
            let lesson_id: LessonId = parse_id("lesson", &lesson)?;
            let module_id: ModuleId = parse_id("module", &module)?;
            let result = app
                .tracker
                .toggle_module(&actor, lesson_id, module_id, !off, now)
                .await?;
            app.emit(&result, |r| {
                println!("{} module(s) completed", r.completed_modules.len());
            })?;
        }
        Commands::Complete { lesson, undo } => {
            let actor = app.actor(user).await?;
            let lesson_id: LessonId = parse_id("lesson", &lesson)?;
            let result = app
                .tracker
                .set_lesson_completed(&actor, lesson_id, !undo, now)
                .await?;
            app.emit(&result, |r| {
                println!("Lesson completed: {}", r.completed);
            })?;
        }
        Commands::Lesson { lesson } => {
            let actor = app.actor(user).await?;
            let lesson_id: LessonId = parse_id("lesson", &lesson)?;
            let progress = app.tracker.get_lesson_progress(&actor, lesson_id).await?;
            app.emit(&progress, |p| {
                println!("Lesson {}", p.lesson_id);
                println!("  Progress: {}%", p.percentage);
                println!("  Modules done: {}", p.completed_modules.len());
                println!("  Completed: {}", p.completed);
            })?;
        }
        Commands::Course { course } => {
            let actor = app.actor(user).await?;
            let course_id: CourseId = course.parse()?;
            let outline = app.tracker.course_outline(&actor, &course_id).await?;
            app.emit(&outline, |o| {
                println!(
                    "{} ({}%, {}/{} lessons)",
                    o.title.as_deref().unwrap_or(o.course_id.as_str()),
                    o.progress.percentage,
                    o.progress.completed_lessons,
                    o.progress.total_lessons
                );
                for l in &o.lessons {
                    let mark = if l.completed { "x" } else { " " };
                    println!(
                        "  [{}] {:>3}% {} ({})",
                        mark, l.percentage, l.title, l.lesson_id
                    );
                }
            })?;
        }
        Commands::Assignments { course } => {
            let actor = app.actor(user).await?;
            let course_id: CourseId = course.parse()?;
            let items = app.submissions.list_assignments(&actor, &course_id, now).await?;
            app.emit(&items, |items| {
                println!("Assignments ({})", items.len());
                for item in items {
                    let soon = if item.closing_soon { " (closing soon)" } else { "" };
                    println!(
                        "  {} | {} | {} - {}{}",
                        item.assignment.id,
                        item.status,
                        format_due(item.assignment.due_date),
                        item.assignment.title,
                        soon
                    );
                }
            })?;
        }
        Commands::Submit { assignment, text, file, notes, answers } => {
            let actor = app.actor(user).await?;
            let assignment_id: AssignmentId = parse_id("assignment", &assignment)?;
            let record = app
                .storage
                .load_assignment(assignment_id)
                .await?
                .ok_or_else(|| LearnError::not_found("assignment", assignment_id))?;
            let answers = build_answers(record.kind, text, file, notes, answers);

            let submission = app
                .submissions
                .submit_assignment(&actor, assignment_id, answers, now)
                .await?;
            app.emit(&submission, |s| {
                println!("Submitted {} at {}", s.id, s.submitted_at);
                if s.is_graded() {
                    println!("  Previous grade kept: {:?}", s.score);
                }
            })?;
        }
        Commands::Grade { submission, score, feedback } => {
            let actor = app.actor(user).await?;
            let submission_id: SubmissionId = parse_id("submission", &submission)?;
            let grade = Grade {
                score: score.map(checked_score).transpose()?,
                feedback,
            };
            let graded = app
                .submissions
                .grade_submission(&actor, submission_id, grade, now)
                .await?;
            app.emit(&graded, |s| {
                println!("Graded {}: score {:?}", s.id, s.score);
            })?;
        }
        Commands::Status { assignment, of } => {
            let actor = app.actor(user).await?;
            let assignment_id: AssignmentId = parse_id("assignment", &assignment)?;
            let status = match of {
                Some(raw) => {
                    let learner: UserId = parse_id("user", &raw)?;
                    app.submissions
                        .submission_status_for(&actor, assignment_id, learner, now)
                        .await?
                }
                None => {
                    app.submissions
                        .submission_status(&actor, assignment_id, now)
                        .await?
                }
            };
            app.emit(&status, |s| println!("{}", s))?;
        }
        Commands::Show { submission } => {
            let actor = app.actor(user).await?;
            let submission_id: SubmissionId = parse_id("submission", &submission)?;
            let found = app.submissions.view_submission(&actor, submission_id).await?;
            app.emit(&found, |s| {
                println!("Submission {}", s.id);
                println!("  Assignment: {}", s.assignment_id);
                println!("  Learner: {}", s.user_id);
                println!("  Submitted: {}", s.submitted_at);
                match s.graded_at {
                    Some(at) => {
                        println!("  Graded: {}", at);
                        println!("  Score: {:?}", s.score);
                        if let Some(feedback) = &s.feedback {
                            println!("  Feedback: {}", feedback);
                        }
                    }
                    None => println!("  Not graded yet"),
                }
            })?;
        }
        Commands::Review { course } => {
            let actor = app.actor(user).await?;
            let course_id: CourseId = course.parse()?;
            let queue = app.submissions.review_queue(&actor, &course_id).await?;
            app.emit(&queue, |queue| {
                println!("Review queue ({})", queue.len());
                for item in queue {
                    let state = if item.submission.is_graded() { "graded" } else { "to grade" };
                    println!(
                        "  {} | {} | {} - {}",
                        item.submission.id, state, item.submission.submitted_at, item.assignment_title
                    );
                }
            })?;
        }
        Commands::Dashboard => {
            let actor = app.actor(user).await?;
            let summary = app.dashboard.summary(&actor, now).await?;
            app.emit(&summary, |d| {
                println!("Dashboard");
                println!("  Courses: {}", d.enrolled_courses);
                println!(
                    "  Lessons: {}/{} ({}%)",
                    d.completed_lessons, d.total_lessons, d.overall_progress
                );
                println!("  Pending assignments: {}", d.pending_assignments);
                for c in &d.courses {
                    println!(
                        "  {} {}%",
                        c.title.as_deref().unwrap_or(c.course_id.as_str()),
                        c.percentage
                    );
                }
                if !d.upcoming.is_empty() {
                    println!("Upcoming");
                    for deadline in &d.upcoming {
                        let soon = if deadline.closing_soon { " (closing soon)" } else { "" };
                        println!(
                            "  {} | {} - {}{}",
                            deadline.status,
                            format_due(deadline.due_date),
                            deadline.title,
                            soon
                        );
                    }
                }
            })?;
        }
    }

    Ok(())
}
