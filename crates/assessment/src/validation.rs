//! Input checks for submissions and grades.
//!
//! Everything here runs before the store is touched. A rejected payload
//! leaves no trace.

use coursetrack_core::{Answers, Assignment, Grade, LearnError, Result};

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Extension of an uploaded file URL, lower-cased, ignoring any query or fragment.
pub fn file_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

fn check_format(assignment: &Assignment, url: &str) -> Result<()> {
    if assignment.accepted_formats.is_empty() {
        return Ok(());
    }
    match file_extension(url) {
        Some(ext) if assignment.accepted_formats.contains(&ext) => Ok(()),
        Some(ext) => Err(LearnError::Validation(format!(
            "file type .{} not accepted (allowed: {})",
            ext,
            assignment.accepted_formats.join(", ")
        ))),
        None => Err(LearnError::Validation(format!(
            "file has no extension (allowed: {})",
            assignment.accepted_formats.join(", ")
        ))),
    }
}

/// Check answers against the assignment and return them normalized
/// (blank optional fields dropped, text trimmed).
///
/// Rejects payloads of the wrong kind, empty payloads, and uploads whose
/// extension is not in the assignment's accepted formats.
pub fn validate_answers(assignment: &Assignment, answers: Answers) -> Result<Answers> {
    if answers.kind() != assignment.kind {
        return Err(LearnError::Validation(format!(
            "{} answers submitted for a {} assignment",
            answers.kind(),
            assignment.kind
        )));
    }

    let answers = match answers {
        Answers::Essay { text, file_url } => {
            let text = text.trim().to_string();
            let file_url = blank_to_none(file_url);
            if text.is_empty() && file_url.is_none() {
                return Err(LearnError::Validation(
                    "write an answer or upload a file".to_string(),
                ));
            }
            Answers::Essay { text, file_url }
        }
        Answers::Quiz { answers } => {
            if answers.iter().all(|a| a.trim().is_empty()) {
                return Err(LearnError::Validation(
                    "answer at least one question".to_string(),
                ));
            }
            Answers::Quiz { answers }
        }
        Answers::Coding { file_url, notes } => {
            let file_url = blank_to_none(file_url);
            let notes = blank_to_none(notes);
            if file_url.is_none() && notes.is_none() {
                return Err(LearnError::Validation(
                    "upload a file or add notes".to_string(),
                ));
            }
            Answers::Coding { file_url, notes }
        }
    };

    if let Some(url) = answers.file_url() {
        check_format(assignment, url)?;
    }
    Ok(answers)
}

/// Check a grade against the assignment and return it normalized.
///
/// At least one of score or feedback is required, and the score may not
/// exceed the assignment's maximum.
pub fn validate_grade(assignment: &Assignment, grade: Grade) -> Result<Grade> {
    let grade = Grade {
        score: grade.score,
        feedback: blank_to_none(grade.feedback),
    };

    if grade.score.is_none() && grade.feedback.is_none() {
        return Err(LearnError::Validation(
            "provide a score or feedback".to_string(),
        ));
    }
    if let Some(score) = grade.score {
        if score > assignment.max_score {
            return Err(LearnError::Validation(format!(
                "score {} is out of range 0..={}",
                score, assignment.max_score
            )));
        }
    }
    Ok(grade)
}

/// Convert a raw (possibly negative) score from an outer surface.
pub fn checked_score(raw: i64) -> Result<u32> {
    u32::try_from(raw)
        .map_err(|_| LearnError::Validation(format!("score {} must not be negative", raw)))
}
