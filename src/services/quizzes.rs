// src/services/quizzes.rs

use std::collections::HashMap;

use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::quiz::{QuestionWithOptions, Quiz, QuizOption, QuizQuestion},
};

pub const QUIZ_COLUMNS: &str = "id, title, course_id, is_published, duration_minutes, is_homework, \
                                homework_text, due_at, created_at, attachment_path, attachment_filename";

pub async fn find_quiz(pool: &SqlitePool, quiz_id: i64) -> Result<Option<Quiz>, AppError> {
    let quiz = sqlx::query_as::<_, Quiz>(&format!("SELECT {} FROM quizzes WHERE id = ?", QUIZ_COLUMNS))
        .bind(quiz_id)
        .fetch_optional(pool)
        .await?;

    Ok(quiz)
}

pub async fn load_quiz(pool: &SqlitePool, quiz_id: i64) -> Result<Quiz, AppError> {
    find_quiz(pool, quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))
}

/// Published quizzes of the given courses, newest first.
pub async fn list_published(
    pool: &SqlitePool,
    course_ids: &[i64],
    homework: bool,
) -> Result<Vec<Quiz>, AppError> {
    if course_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query_builder = sqlx::QueryBuilder::<sqlx::Sqlite>::new(format!(
        "SELECT {} FROM quizzes WHERE is_published = TRUE AND is_homework = ",
        QUIZ_COLUMNS
    ));
    query_builder.push_bind(homework);
    query_builder.push(" AND course_id IN (");

    let mut separated = query_builder.separated(",");
    for id in course_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY created_at DESC, id DESC");

    let quizzes = query_builder
        .build_query_as::<Quiz>()
        .fetch_all(pool)
        .await?;

    Ok(quizzes)
}

/// Every quiz of one kind, newest first (staff listing).
pub async fn list_all(pool: &SqlitePool, homework: bool) -> Result<Vec<Quiz>, AppError> {
    let quizzes = sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {} FROM quizzes WHERE is_homework = ? ORDER BY created_at DESC, id DESC",
        QUIZ_COLUMNS
    ))
    .bind(homework)
    .fetch_all(pool)
    .await?;

    Ok(quizzes)
}

/// Questions of a quiz in creation order, each with its options.
pub async fn load_questions(
    pool: &SqlitePool,
    quiz_id: i64,
) -> Result<Vec<QuestionWithOptions>, AppError> {
    let questions = sqlx::query_as::<_, QuizQuestion>(
        "SELECT id, quiz_id, text, topic, difficulty FROM quiz_questions WHERE quiz_id = ? ORDER BY id",
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    let options = sqlx::query_as::<_, QuizOption>(
        r#"
        SELECT o.id, o.question_id, o.text, o.is_correct
        FROM quiz_options o
        JOIN quiz_questions q ON o.question_id = q.id
        WHERE q.quiz_id = ?
        ORDER BY o.id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    let mut by_question: HashMap<i64, Vec<QuizOption>> = HashMap::new();
    for option in options {
        by_question.entry(option.question_id).or_default().push(option);
    }

    Ok(questions
        .into_iter()
        .map(|question| QuestionWithOptions {
            options: by_question.remove(&question.id).unwrap_or_default(),
            question,
        })
        .collect())
}
