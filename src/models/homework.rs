// src/models/homework.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::models::quiz::Quiz;

/// Represents the 'homework_submissions' table.
/// Rows are append-only; the latest one per (quiz, student) is the current hand-in.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct HomeworkSubmission {
    pub id: i64,
    pub quiz_id: i64,
    pub student_id: i64,
    pub text: Option<String>,
    /// Stored file name inside the homework upload directory.
    #[serde(skip)]
    pub file_path: Option<String>,
    pub original_filename: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub score: Option<i64>,
}

/// Homework listing entry for a student.
#[derive(Debug, Serialize, ToSchema)]
pub struct HomeworkSummary {
    pub quiz: Quiz,
    pub is_late: bool,
    pub remaining_seconds: Option<i64>,
}

/// Assignment page for a student.
#[derive(Debug, Serialize, ToSchema)]
pub struct HomeworkView {
    pub quiz: Quiz,
    pub is_late: bool,
    pub remaining_seconds: Option<i64>,
    pub submission: Option<HomeworkSubmission>,
}

/// Grade input as typed by a teacher: a number, a numeric string, or empty/null to clear.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum GradeInput {
    Number(i64),
    Text(String),
    /// Anything else (fractions, booleans, objects); always rejected.
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GradeRequest {
    #[serde(default)]
    pub score: Option<GradeInput>,
}
