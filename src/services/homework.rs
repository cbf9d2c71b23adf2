// src/services/homework.rs

//! Homework hand-ins.
//!
//! Every hand-in appends a row; the newest one per (quiz, student) is what the
//! teacher grades. Attached files live under the homework upload directory
//! with a generated name, the original name is kept for downloads.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    config::ALLOWED_HOMEWORK_EXTENSIONS,
    error::AppError,
    services::quizzes::QUIZ_COLUMNS,
    models::{
        homework::{GradeInput, HomeworkSubmission},
        quiz::Quiz,
        roster::Student,
    },
};

const SUBMISSION_COLUMNS: &str =
    "id, quiz_id, student_id, text, file_path, original_filename, submitted_at, score";

/// A file received with a submission.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// What a student handed in, before validation.
#[derive(Debug, Clone, Default)]
pub struct SubmissionDraft {
    pub text: Option<String>,
    pub file: Option<UploadedFile>,
}

pub fn is_late(due_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    matches!(due_at, Some(due) if now > due)
}

/// Seconds until the deadline, floored at zero; `None` without a deadline.
pub fn remaining_seconds(due_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i64> {
    due_at.map(|due| (due - now).num_seconds().max(0))
}

pub fn allowed_homework_file(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_HOMEWORK_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Base name of an uploaded file with anything outside `[A-Za-z0-9._-]` replaced.
fn sanitize_filename(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");

    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn ensure_allowed_file(file: &UploadedFile) -> Result<(), AppError> {
    if !allowed_homework_file(&file.filename) {
        return Err(AppError::BadRequest(format!(
            "Files of this type are not accepted. Allowed: {}",
            ALLOWED_HOMEWORK_EXTENSIONS.join(", ")
        )));
    }
    Ok(())
}

/// Writes an upload under a generated name and returns that name.
async fn store_upload(homework_dir: &Path, file: &UploadedFile) -> Result<String, AppError> {
    let stored_name = format!("{}_{}", Uuid::new_v4(), sanitize_filename(&file.filename));
    tokio::fs::create_dir_all(homework_dir).await?;
    tokio::fs::write(homework_dir.join(&stored_name), &file.bytes)
        .await
        .map_err(|e| {
            tracing::error!("Failed to store homework file: {:?}", e);
            AppError::from(e)
        })?;
    Ok(stored_name)
}

async fn discard_upload(homework_dir: &Path, name: &str) {
    if let Err(io) = tokio::fs::remove_file(homework_dir.join(name)).await {
        tracing::warn!("Could not remove upload {}: {:?}", name, io);
    }
}

fn ensure_homework(quiz: &Quiz) -> Result<(), AppError> {
    if !quiz.is_homework {
        return Err(AppError::BadRequest(
            "This quiz is a timed test, not a homework assignment".to_string(),
        ));
    }
    Ok(())
}

/// Validates and stores a hand-in.
///
/// Nothing is written when the deadline has passed, when the draft is empty
/// or when the file type is not accepted.
pub async fn submit(
    pool: &SqlitePool,
    homework_dir: &Path,
    quiz: &Quiz,
    student: &Student,
    draft: SubmissionDraft,
    now: DateTime<Utc>,
) -> Result<HomeworkSubmission, AppError> {
    ensure_homework(quiz)?;

    if is_late(quiz.due_at, now) {
        return Err(AppError::BadRequest(
            "The deadline for this assignment has passed".to_string(),
        ));
    }

    let text = draft
        .text
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    let file = draft.file.filter(|f| !f.filename.is_empty() && !f.bytes.is_empty());

    if text.is_none() && file.is_none() {
        return Err(AppError::BadRequest(
            "Provide an answer text or attach a file".to_string(),
        ));
    }

    if let Some(f) = &file {
        ensure_allowed_file(f)?;
    }

    let stored = match &file {
        Some(f) => Some(store_upload(homework_dir, f).await?),
        None => None,
    };

    let inserted = sqlx::query_as::<_, HomeworkSubmission>(&format!(
        "INSERT INTO homework_submissions (quiz_id, student_id, text, file_path, original_filename, submitted_at) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING {}",
        SUBMISSION_COLUMNS
    ))
    .bind(quiz.id)
    .bind(student.id)
    .bind(&text)
    .bind(&stored)
    .bind(file.as_ref().map(|f| f.filename.clone()))
    .bind(now)
    .fetch_one(pool)
    .await;

    match inserted {
        Ok(submission) => {
            tracing::info!(
                "Student {} handed in homework {} (submission {})",
                student.id,
                quiz.id,
                submission.id
            );
            Ok(submission)
        }
        Err(e) => {
            tracing::error!("Failed to record homework submission: {:?}", e);
            if let Some(name) = &stored {
                discard_upload(homework_dir, name).await;
            }
            Err(AppError::from(e))
        }
    }
}

/// The student's most recent hand-in for a quiz.
pub async fn latest(
    pool: &SqlitePool,
    quiz_id: i64,
    student_id: i64,
) -> Result<Option<HomeworkSubmission>, AppError> {
    let submission = sqlx::query_as::<_, HomeworkSubmission>(&format!(
        "SELECT {} FROM homework_submissions WHERE quiz_id = ? AND student_id = ? \
         ORDER BY submitted_at DESC, id DESC LIMIT 1",
        SUBMISSION_COLUMNS
    ))
    .bind(quiz_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    Ok(submission)
}

pub async fn list_for_quiz(pool: &SqlitePool, quiz_id: i64) -> Result<Vec<HomeworkSubmission>, AppError> {
    let submissions = sqlx::query_as::<_, HomeworkSubmission>(&format!(
        "SELECT {} FROM homework_submissions WHERE quiz_id = ? ORDER BY submitted_at DESC, id DESC",
        SUBMISSION_COLUMNS
    ))
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    Ok(submissions)
}

pub async fn find_submission(pool: &SqlitePool, submission_id: i64) -> Result<HomeworkSubmission, AppError> {
    sqlx::query_as::<_, HomeworkSubmission>(&format!(
        "SELECT {} FROM homework_submissions WHERE id = ?",
        SUBMISSION_COLUMNS
    ))
    .bind(submission_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))
}

/// Reads a grade as typed by a teacher. Blank or missing clears the grade.
pub fn parse_grade(input: Option<&GradeInput>) -> Result<Option<i64>, AppError> {
    match input {
        None => Ok(None),
        Some(GradeInput::Number(n)) => Ok(Some(*n)),
        Some(GradeInput::Text(raw)) => {
            let raw = raw.trim();
            if raw.is_empty() {
                return Ok(None);
            }
            raw.parse::<i64>()
                .map(Some)
                .map_err(|_| AppError::BadRequest(format!("Grade '{}' is not a whole number", raw)))
        }
        Some(GradeInput::Other(value)) => Err(AppError::BadRequest(format!(
            "Grade {} is not a whole number",
            value
        ))),
    }
}

/// Sets or clears the score of one submission.
pub async fn grade(
    pool: &SqlitePool,
    submission_id: i64,
    score: Option<i64>,
) -> Result<HomeworkSubmission, AppError> {
    let updated = sqlx::query_as::<_, HomeworkSubmission>(&format!(
        "UPDATE homework_submissions SET score = ? WHERE id = ? RETURNING {}",
        SUBMISSION_COLUMNS
    ))
    .bind(score)
    .bind(submission_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to grade submission {}: {:?}", submission_id, e);
        AppError::from(e)
    })?
    .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))?;

    tracing::info!("Submission {} graded: {:?}", submission_id, score);
    Ok(updated)
}

/// Attaches a teacher's file to a homework assignment, replacing any earlier one.
pub async fn attach_assignment_file(
    pool: &SqlitePool,
    homework_dir: &Path,
    quiz: &Quiz,
    file: UploadedFile,
) -> Result<Quiz, AppError> {
    ensure_homework(quiz)?;
    if file.filename.is_empty() || file.bytes.is_empty() {
        return Err(AppError::BadRequest("Attach a non-empty file".to_string()));
    }
    ensure_allowed_file(&file)?;

    let stored = store_upload(homework_dir, &file).await?;

    let updated = sqlx::query_as::<_, Quiz>(&format!(
        "UPDATE quizzes SET attachment_path = ?, attachment_filename = ? WHERE id = ? RETURNING {}",
        QUIZ_COLUMNS
    ))
    .bind(&stored)
    .bind(&file.filename)
    .bind(quiz.id)
    .fetch_optional(pool)
    .await;

    let updated = match updated {
        Ok(Some(updated)) => updated,
        Ok(None) => {
            discard_upload(homework_dir, &stored).await;
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }
        Err(e) => {
            tracing::error!("Failed to record attachment of quiz {}: {:?}", quiz.id, e);
            discard_upload(homework_dir, &stored).await;
            return Err(AppError::from(e));
        }
    };

    if let Some(previous) = &quiz.attachment_path {
        discard_upload(homework_dir, previous).await;
    }

    tracing::info!("Attached '{}' to homework {}", file.filename, quiz.id);
    Ok(updated)
}

/// Path of the teacher's attachment, if the assignment has one.
pub fn attachment_location(homework_dir: &Path, quiz: &Quiz) -> Option<PathBuf> {
    quiz.attachment_path.as_ref().map(|name| homework_dir.join(name))
}

/// Path of the stored file, if the submission has one.
pub fn file_location(homework_dir: &Path, submission: &HomeworkSubmission) -> Option<PathBuf> {
    submission.file_path.as_ref().map(|name| homework_dir.join(name))
}
