// src/services/analytics.rs

//! Per-student accuracy over submitted quiz answers.

use sqlx::{FromRow, SqlitePool};

use crate::{
    error::AppError,
    models::quiz::{Accuracy, StudentAnalytics},
};

/// Bucket for questions without a topic or difficulty.
pub const UNSPECIFIED: &str = "unspecified";

/// One stored answer with the labels of its question.
#[derive(Debug, Clone, FromRow)]
pub struct AnsweredQuestion {
    pub topic: Option<String>,
    pub difficulty: Option<String>,
    pub is_correct: bool,
}

impl Accuracy {
    fn record(&mut self, is_correct: bool) {
        self.total += 1;
        if is_correct {
            self.correct += 1;
        }
    }
}

fn bucket(label: Option<&str>) -> String {
    match label.map(str::trim) {
        Some(label) if !label.is_empty() => label.to_string(),
        _ => UNSPECIFIED.to_string(),
    }
}

pub fn aggregate(answers: &[AnsweredQuestion]) -> StudentAnalytics {
    let mut analytics = StudentAnalytics::default();

    for answer in answers {
        analytics
            .topics
            .entry(bucket(answer.topic.as_deref()))
            .or_default()
            .record(answer.is_correct);
        analytics
            .difficulty
            .entry(bucket(answer.difficulty.as_deref()))
            .or_default()
            .record(answer.is_correct);
    }

    analytics
}

/// Accuracy over every answer the student has submitted, across all attempts.
pub async fn for_student(pool: &SqlitePool, student_id: i64) -> Result<StudentAnalytics, AppError> {
    let answers = sqlx::query_as::<_, AnsweredQuestion>(
        r#"
        SELECT q.topic, q.difficulty, o.is_correct
        FROM attempt_answers aa
        JOIN attempts a ON aa.attempt_id = a.id
        JOIN quiz_questions q ON aa.question_id = q.id
        JOIN quiz_options o ON aa.option_id = o.id
        WHERE a.student_id = ?
        ORDER BY aa.id
        "#,
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(aggregate(&answers))
}
