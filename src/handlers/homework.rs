// src/handlers/homework.rs

use axum::{
    Json,
    body::Body,
    extract::{Extension, Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{
        homework::{GradeRequest, HomeworkSubmission, HomeworkSummary, HomeworkView},
        quiz::Quiz,
        roster::Student,
    },
    services::{
        homework::{self, SubmissionDraft, UploadedFile},
        quizzes, roster,
    },
    state::AppState,
    utils::jwt::Claims,
};

/// Loads a published homework assignment the student can see.
async fn load_assignment(pool: &SqlitePool, student: &Student, quiz_id: i64) -> Result<Quiz, AppError> {
    let quiz = quizzes::load_quiz(pool, quiz_id).await?;
    if !quiz.is_homework || !quiz.is_published {
        return Err(AppError::NotFound("Assignment not found".to_string()));
    }
    roster::ensure_course_access(pool, student, quiz.course_id).await?;
    Ok(quiz)
}

/// Published homework of the caller's courses with time left.
#[utoipa::path(
    get,
    path = "/api/homework",
    responses((status = 200, description = "Assignments with time left", body = [HomeworkSummary])),
    security(("bearer" = [])),
    tag = "homework"
)]
pub async fn list_homework(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student = roster::require_student(&state.pool, &claims).await?;
    let course_ids = roster::course_ids(&state.pool, &student).await?;
    let now = state.clock.now();

    let summaries: Vec<HomeworkSummary> = quizzes::list_published(&state.pool, &course_ids, true)
        .await?
        .into_iter()
        .map(|quiz| HomeworkSummary {
            is_late: homework::is_late(quiz.due_at, now),
            remaining_seconds: homework::remaining_seconds(quiz.due_at, now),
            quiz,
        })
        .collect();

    Ok(Json(summaries))
}

/// Assignment page: instructions, deadline state and the latest hand-in.
#[utoipa::path(
    get,
    path = "/api/homework/{quiz_id}",
    params(("quiz_id" = i64, Path, description = "Homework quiz id")),
    responses(
        (status = 200, description = "Assignment with the latest hand-in", body = HomeworkView),
        (status = 404, description = "Assignment not found")
    ),
    security(("bearer" = [])),
    tag = "homework"
)]
pub async fn get_homework(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student = roster::require_student(&state.pool, &claims).await?;
    let quiz = load_assignment(&state.pool, &student, quiz_id).await?;
    let submission = homework::latest(&state.pool, quiz.id, student.id).await?;
    let now = state.clock.now();

    Ok(Json(HomeworkView {
        is_late: homework::is_late(quiz.due_at, now),
        remaining_seconds: homework::remaining_seconds(quiz.due_at, now),
        quiz,
        submission,
    }))
}

/// Multipart hand-in with an optional `text` field and an optional `file` field.
#[utoipa::path(
    post,
    path = "/api/homework/{quiz_id}/submissions",
    params(("quiz_id" = i64, Path, description = "Homework quiz id")),
    responses(
        (status = 201, description = "Hand-in stored", body = HomeworkSubmission),
        (status = 400, description = "Late, empty, or file type not accepted")
    ),
    security(("bearer" = [])),
    tag = "homework"
)]
pub async fn submit_homework(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let student = roster::require_student(&state.pool, &claims).await?;
    let quiz = load_assignment(&state.pool, &student, quiz_id).await?;

    let mut draft = SubmissionDraft::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        match field.name() {
            Some("text") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                draft.text = Some(text);
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                draft.file = Some(UploadedFile {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let submission = homework::submit(
        &state.pool,
        &state.config.homework_dir(),
        &quiz,
        &student,
        draft,
        state.clock.now(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(submission)))
}

/// Sets or clears the grade of a submission. Staff only.
#[utoipa::path(
    put,
    path = "/api/homework/submissions/{id}/grade",
    params(("id" = i64, Path, description = "Submission id")),
    request_body = GradeRequest,
    responses(
        (status = 200, description = "Grade stored", body = HomeworkSubmission),
        (status = 400, description = "Grade is not a whole number"),
        (status = 404, description = "Submission not found")
    ),
    security(("bearer" = [])),
    tag = "homework"
)]
pub async fn grade_submission(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<GradeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let score = homework::parse_grade(payload.score.as_ref())?;
    let submission = homework::grade(&pool, id, score).await?;
    Ok(Json(submission))
}

/// `Content-Disposition` value with the file name restricted to what a header can carry.
fn attachment_header(name: Option<&str>, fallback: &str) -> String {
    let name = name.unwrap_or(fallback);
    let ascii: String = name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("attachment; filename=\"{}\"", ascii)
}

/// Reads a stored upload and sends it as a download.
async fn send_stored_file(path: &std::path::Path, disposition: String) -> Result<Response, AppError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Stored file {} is missing", path.display());
            return Err(AppError::NotFound("File not found".to_string()));
        }
        Err(e) => return Err(AppError::from(e)),
    };

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(bytes),
    )
        .into_response())
}

/// Sends the attached file back to its owner or to staff.
pub async fn download_submission_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let submission = homework::find_submission(&state.pool, id).await?;

    if !claims.is_staff() {
        let student = roster::require_student(&state.pool, &claims).await?;
        if student.id != submission.student_id {
            return Err(AppError::Forbidden("Not your submission".to_string()));
        }
    }

    let path = homework::file_location(&state.config.homework_dir(), &submission)
        .ok_or(AppError::NotFound("This submission has no file".to_string()))?;

    send_stored_file(
        &path,
        attachment_header(submission.original_filename.as_deref(), "submission"),
    )
    .await
}

/// Sends the teacher's attachment of an assignment to staff or to students of its course.
pub async fn download_assignment_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<Response, AppError> {
    let quiz = if claims.is_staff() {
        quizzes::load_quiz(&state.pool, quiz_id).await?
    } else {
        let student = roster::require_student(&state.pool, &claims).await?;
        load_assignment(&state.pool, &student, quiz_id).await?
    };

    let path = homework::attachment_location(&state.config.homework_dir(), &quiz)
        .ok_or(AppError::NotFound("This assignment has no attachment".to_string()))?;

    send_stored_file(
        &path,
        attachment_header(quiz.attachment_filename.as_deref(), "assignment"),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_header_is_header_safe() {
        assert_eq!(
            attachment_header(Some("essay \"v2\".pdf"), "submission"),
            "attachment; filename=\"essay _v2_.pdf\""
        );
        assert_eq!(
            attachment_header(Some("эссе.pdf"), "submission"),
            "attachment; filename=\"____.pdf\""
        );
        assert_eq!(
            attachment_header(None, "assignment"),
            "attachment; filename=\"assignment\""
        );
    }
}
