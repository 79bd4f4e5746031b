//! Progress percentage calculations.
//!
//! Lesson progress is counted in modules; course progress is counted in
//! lessons whose lesson-level flag is set. The two bases are intentionally
//! different and must not be unified.

use std::collections::{BTreeSet, HashMap};

use coursetrack_core::{CourseId, CourseProgress, Lesson, LessonId, LessonProgress, ModuleId, Progress};

/// `round(100 * part / whole)`, clamped to 100. Zero when `whole` is zero.
pub fn percentage(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    let pct = (part as f64 * 100.0 / whole as f64).round();
    pct.min(100.0) as u8
}

/// Progress of one lesson.
///
/// With modules, the percentage is the share of the lesson's current modules
/// that are checked off (stale module ids are ignored). Without modules it is
/// 100 when the lesson-level flag is set and 0 otherwise.
pub fn compute_lesson_progress(progress: Option<&Progress>, lesson: &Lesson) -> LessonProgress {
    let lesson_modules: BTreeSet<ModuleId> = lesson.modules.iter().map(|m| m.id).collect();

    let (completed_modules, completed) = match progress {
        Some(p) => (
            p.completed_modules
                .intersection(&lesson_modules)
                .copied()
                .collect::<BTreeSet<_>>(),
            p.completed,
        ),
        None => (BTreeSet::new(), false),
    };

    let percentage = if lesson_modules.is_empty() {
        if completed {
            100
        } else {
            0
        }
    } else {
        percentage(completed_modules.len(), lesson_modules.len())
    };

    LessonProgress {
        lesson_id: lesson.id,
        completed_modules,
        completed,
        percentage,
    }
}

/// Progress of one course: lessons flagged completed over lessons in the course.
pub fn compute_course_progress(
    course_id: &CourseId,
    lessons: &[Lesson],
    progress: &HashMap<LessonId, Progress>,
) -> CourseProgress {
    let completed_lessons = lessons
        .iter()
        .filter(|l| progress.get(&l.id).map(|p| p.completed).unwrap_or(false))
        .count();

    CourseProgress {
        course_id: course_id.clone(),
        percentage: percentage(completed_lessons, lessons.len()),
        completed_lessons,
        total_lessons: lessons.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursetrack_core::{ProgressChange, UserId};

    fn course() -> CourseId {
        CourseId::new("rust-101").unwrap()
    }

    fn lesson_with(modules: usize) -> Lesson {
        let mut lesson = Lesson::new(course(), "Lesson", 0);
        for i in 0..modules {
            lesson = lesson.with_module(format!("Module {}", i));
        }
        lesson
    }

    fn progress_for(lesson: &Lesson, done: usize, completed: bool) -> Progress {
        let now = chrono::Utc::now();
        let mut progress = Progress::new(UserId::new(), lesson.id, now);
        for module in lesson.modules.iter().take(done) {
            progress.apply(&ProgressChange::Module { module_id: module.id, completed: true }, now);
        }
        progress.apply(&ProgressChange::Lesson { completed }, now);
        progress
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 2), 50);
        assert_eq!(percentage(3, 3), 100);
    }

    #[test]
    fn test_lesson_progress_counts_modules() {
        let lesson = lesson_with(3);
        let progress = progress_for(&lesson, 2, false);

        let view = compute_lesson_progress(Some(&progress), &lesson);
        assert_eq!(view.percentage, 67);
        assert_eq!(view.completed_modules.len(), 2);
        assert!(!view.completed);
    }

    #[test]
    fn test_lesson_progress_ignores_stale_modules() {
        let lesson = lesson_with(2);
        let mut progress = progress_for(&lesson, 1, false);
        progress.completed_modules.insert(ModuleId::new());

        let view = compute_lesson_progress(Some(&progress), &lesson);
        assert_eq!(view.percentage, 50);
        assert_eq!(view.completed_modules.len(), 1);
    }

    #[test]
    fn test_lesson_without_modules_uses_flag() {
        let lesson = lesson_with(0);
        assert_eq!(compute_lesson_progress(None, &lesson).percentage, 0);

        let flagged = progress_for(&lesson, 0, true);
        assert_eq!(compute_lesson_progress(Some(&flagged), &lesson).percentage, 100);
    }

    #[test]
    fn test_flag_does_not_inflate_module_percentage() {
        let lesson = lesson_with(4);
        let progress = progress_for(&lesson, 1, true);
        let view = compute_lesson_progress(Some(&progress), &lesson);
        assert_eq!(view.percentage, 25);
        assert!(view.completed);
    }

    #[test]
    fn test_course_progress_counts_lesson_flags() {
        let full_but_unflagged = lesson_with(2);
        let flagged = lesson_with(2);

        let mut progress = HashMap::new();
        progress.insert(full_but_unflagged.id, progress_for(&full_but_unflagged, 2, false));
        progress.insert(flagged.id, progress_for(&flagged, 0, true));

        let lessons = vec![full_but_unflagged, flagged];
        let view = compute_course_progress(&course(), &lessons, &progress);
        assert_eq!(view.percentage, 50);
        assert_eq!(view.completed_lessons, 1);
        assert_eq!(view.total_lessons, 2);
    }

    #[test]
    fn test_empty_course_is_zero() {
        let view = compute_course_progress(&course(), &[], &HashMap::new());
        assert_eq!(view.percentage, 0);
        assert_eq!(view.total_lessons, 0);
    }
}
