// src/services/attempts.rs

//! Timed quiz attempts.
//!
//! An attempt moves `NotStarted -> InProgress -> Finished`. The in-progress
//! attempt of a quiz is remembered in the caller's session under
//! `attempt_test_<quiz id>`, so reloading the quiz page resumes it instead of
//! starting over. Finishing an attempt releases that binding.
//!
//! Two starts for the same student and quiz from different sessions are not
//! serialized against each other and each creates its own attempt.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{
        quiz::{Attempt, QuestionWithOptions, Quiz},
        roster::Student,
    },
    services::session::{SessionContext, SessionStore},
    utils::form::parse_selections,
};

const ATTEMPT_COLUMNS: &str = "id, quiz_id, student_id, started_at, finished_at, score";

/// Who is taking the quiz.
#[derive(Debug, Clone)]
pub enum Actor {
    Student(Student),
    /// Staff previewing a quiz. Scores are computed but nothing is stored.
    Preview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    NotStarted,
    InProgress,
    Finished,
}

impl AttemptState {
    pub fn of(attempt: Option<&Attempt>) -> Self {
        match attempt {
            None => AttemptState::NotStarted,
            Some(a) if a.finished_at.is_none() => AttemptState::InProgress,
            Some(_) => AttemptState::Finished,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub attempt: Option<Attempt>,
    pub remaining_seconds: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub attempt_id: Option<i64>,
    pub score: i64,
    pub total: i64,
}

/// Seconds left in the window that opened at `started_at`; `None` for untimed quizzes.
pub fn remaining_seconds(quiz: &Quiz, started_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<i64> {
    quiz.duration_minutes.map(|minutes| {
        let elapsed = (now - started_at).num_seconds();
        (minutes * 60 - elapsed).max(0)
    })
}

fn ensure_timed(quiz: &Quiz) -> Result<(), AppError> {
    if quiz.is_homework {
        return Err(AppError::BadRequest(
            "Homework assignments are handed in, not started".to_string(),
        ));
    }
    Ok(())
}

async fn find_attempt(pool: &SqlitePool, attempt_id: i64) -> Result<Option<Attempt>, AppError> {
    let attempt = sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {} FROM attempts WHERE id = ?",
        ATTEMPT_COLUMNS
    ))
    .bind(attempt_id)
    .fetch_optional(pool)
    .await?;

    Ok(attempt)
}

/// The attempt bound in the session for this quiz, if it still exists and belongs to `student`.
async fn bound_attempt(
    pool: &SqlitePool,
    sessions: &dyn SessionStore,
    ctx: &SessionContext,
    quiz: &Quiz,
    student: &Student,
) -> Result<Option<Attempt>, AppError> {
    let Some(attempt_id) = ctx.attempt_id(sessions, quiz.id).await? else {
        return Ok(None);
    };

    let attempt = find_attempt(pool, attempt_id)
        .await?
        .filter(|a| a.quiz_id == quiz.id && a.student_id == student.id);

    Ok(attempt)
}

/// Starts the quiz, or resumes the attempt already running in this session.
pub async fn start(
    pool: &SqlitePool,
    sessions: &dyn SessionStore,
    ctx: &SessionContext,
    quiz: &Quiz,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<StartOutcome, AppError> {
    ensure_timed(quiz)?;

    let Actor::Student(student) = actor else {
        return Ok(StartOutcome {
            attempt: None,
            remaining_seconds: None,
        });
    };

    let existing = bound_attempt(pool, sessions, ctx, quiz, student).await?;

    let attempt = match existing {
        Some(attempt) if AttemptState::of(Some(&attempt)) == AttemptState::InProgress => attempt,
        _ => {
            let attempt = sqlx::query_as::<_, Attempt>(&format!(
                "INSERT INTO attempts (quiz_id, student_id, started_at, score) VALUES (?, ?, ?, 0) RETURNING {}",
                ATTEMPT_COLUMNS
            ))
            .bind(quiz.id)
            .bind(student.id)
            .bind(now)
            .fetch_one(pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create attempt: {:?}", e);
                AppError::from(e)
            })?;

            ctx.bind_attempt(sessions, quiz.id, attempt.id).await?;
            tracing::info!(
                "Student {} started attempt {} on quiz {}",
                student.id,
                attempt.id,
                quiz.id
            );
            attempt
        }
    };

    Ok(StartOutcome {
        remaining_seconds: remaining_seconds(quiz, attempt.started_at, now),
        attempt: Some(attempt),
    })
}

/// A validated answer: the option chosen for one question.
#[derive(Debug, Clone, Copy)]
struct GradedAnswer {
    question_id: i64,
    option_id: i64,
    is_correct: bool,
}

/// Resolves every selection against the quiz's options before anything is written.
fn grade_selections(
    questions: &[QuestionWithOptions],
    selections: &HashMap<i64, i64>,
) -> Result<Vec<GradedAnswer>, AppError> {
    let mut graded = Vec::new();

    for q in questions {
        let Some(&option_id) = selections.get(&q.question.id) else {
            continue;
        };
        let option = q
            .options
            .iter()
            .find(|o| o.id == option_id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Option {} not found for question {}",
                    option_id, q.question.id
                ))
            })?;

        graded.push(GradedAnswer {
            question_id: q.question.id,
            option_id: option.id,
            is_correct: option.is_correct,
        });
    }

    Ok(graded)
}

/// Scores a submission and, for students, finalizes the session's attempt.
///
/// The score is the number of questions whose chosen option is correct.
/// Unanswered questions score nothing and leave no answer row.
#[allow(clippy::too_many_arguments)]
pub async fn submit(
    pool: &SqlitePool,
    sessions: &dyn SessionStore,
    ctx: &SessionContext,
    quiz: &Quiz,
    questions: &[QuestionWithOptions],
    actor: &Actor,
    form: &HashMap<String, String>,
    now: DateTime<Utc>,
) -> Result<SubmitOutcome, AppError> {
    ensure_timed(quiz)?;

    let selections = parse_selections(form)?;
    let graded = grade_selections(questions, &selections)?;

    let score = graded.iter().filter(|g| g.is_correct).count() as i64;
    let total = questions.len() as i64;

    let Actor::Student(student) = actor else {
        return Ok(SubmitOutcome {
            attempt_id: None,
            score,
            total,
        });
    };

    let existing = bound_attempt(pool, sessions, ctx, quiz, student)
        .await?
        .filter(|a| AttemptState::of(Some(a)) == AttemptState::InProgress);

    if let Some(attempt) = &existing {
        if remaining_seconds(quiz, attempt.started_at, now) == Some(0) {
            tracing::warn!(
                "Attempt {} on quiz {} submitted after its time window closed",
                attempt.id,
                quiz.id
            );
        }
    }

    let mut tx = pool.begin().await?;

    let attempt_id = match existing {
        Some(attempt) => attempt.id,
        None => sqlx::query_scalar::<_, i64>(
            "INSERT INTO attempts (quiz_id, student_id, started_at, score) VALUES (?, ?, ?, 0) RETURNING id",
        )
        .bind(quiz.id)
        .bind(student.id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?,
    };

    for answer in &graded {
        sqlx::query("INSERT INTO attempt_answers (attempt_id, question_id, option_id) VALUES (?, ?, ?)")
            .bind(attempt_id)
            .bind(answer.question_id)
            .bind(answer.option_id)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("UPDATE attempts SET finished_at = ?, score = ? WHERE id = ?")
        .bind(now)
        .bind(score)
        .bind(attempt_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await.map_err(|e| {
        tracing::error!("Failed to commit attempt {}: {:?}", attempt_id, e);
        AppError::from(e)
    })?;

    ctx.unbind_attempt(sessions, quiz.id).await?;
    tracing::info!(
        "Attempt {} on quiz {} finished with {}/{}",
        attempt_id,
        quiz.id,
        score,
        total
    );

    Ok(SubmitOutcome {
        attempt_id: Some(attempt_id),
        score,
        total,
    })
}

/// Every attempt of a quiz, newest first.
pub async fn list_for_quiz(pool: &SqlitePool, quiz_id: i64) -> Result<Vec<Attempt>, AppError> {
    let attempts = sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {} FROM attempts WHERE quiz_id = ? ORDER BY started_at DESC, id DESC",
        ATTEMPT_COLUMNS
    ))
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    Ok(attempts)
}
