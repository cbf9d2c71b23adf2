// src/models/quiz.rs

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::homework::HomeworkSubmission;

/// Represents the 'quizzes' table.
///
/// A quiz is either a timed test (`is_homework = false`, optional
/// `duration_minutes`) or a homework assignment (`is_homework = true`,
/// optional `due_at`). The two kinds never share a code path.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub course_id: i64,
    pub is_published: bool,
    /// `None` means untimed.
    pub duration_minutes: Option<i64>,
    pub is_homework: bool,
    pub homework_text: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Stored name of the teacher's attachment inside the homework upload directory.
    #[serde(skip)]
    pub attachment_path: Option<String>,
    pub attachment_filename: Option<String>,
}

/// Represents the 'quiz_questions' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: i64,
    pub quiz_id: i64,
    pub text: String,
    pub topic: Option<String>,
    pub difficulty: Option<String>,
}

/// Represents the 'quiz_options' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizOption {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub is_correct: bool,
}

/// Represents the 'attempts' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Attempt {
    pub id: i64,
    pub quiz_id: i64,
    pub student_id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Number of correctly answered questions.
    pub score: i64,
}

/// Represents the 'attempt_answers' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AttemptAnswer {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub option_id: i64,
}

/// A question together with its options, as loaded for scoring.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionWithOptions {
    #[serde(flatten)]
    pub question: QuizQuestion,
    pub options: Vec<QuizOption>,
}

/// Option shown to a student (correctness hidden).
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicOption {
    pub id: i64,
    pub text: String,
}

/// Question shown to a student while taking a quiz.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicQuestion {
    pub id: i64,
    pub text: String,
    pub topic: Option<String>,
    pub difficulty: Option<String>,
    pub options: Vec<PublicOption>,
}

impl From<&QuestionWithOptions> for PublicQuestion {
    fn from(q: &QuestionWithOptions) -> Self {
        PublicQuestion {
            id: q.question.id,
            text: q.question.text.clone(),
            topic: q.question.topic.clone(),
            difficulty: q.question.difficulty.clone(),
            options: q
                .options
                .iter()
                .map(|o| PublicOption {
                    id: o.id,
                    text: o.text.clone(),
                })
                .collect(),
        }
    }
}

/// DTO for creating a quiz or a homework assignment.
///
/// A homework assignment takes `homework_text` and `due_at`, a timed quiz takes
/// `duration_minutes`. Mixing the two is rejected.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = validate_quiz_kind))]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub course_id: i64,
    #[serde(default)]
    pub is_published: bool,
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub is_homework: bool,
    #[validate(length(max = 20000))]
    pub homework_text: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
}

fn validate_quiz_kind(req: &CreateQuizRequest) -> Result<(), validator::ValidationError> {
    let mixed = if req.is_homework {
        req.duration_minutes.is_some()
    } else {
        req.due_at.is_some() || req.homework_text.is_some()
    };
    if mixed {
        return Err(validator::ValidationError::new("homework_and_timed_fields_mixed"));
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateOptionRequest {
    #[validate(length(min = 1, max = 500))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// DTO for adding a question to a timed quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 5000))]
    pub text: String,
    #[validate(length(max = 100))]
    pub topic: Option<String>,
    #[validate(custom(function = validate_difficulty))]
    pub difficulty: Option<String>,
    #[validate(nested, length(min = 2, max = 4), custom(function = validate_single_correct))]
    pub options: Vec<CreateOptionRequest>,
}

fn validate_single_correct(options: &[CreateOptionRequest]) -> Result<(), validator::ValidationError> {
    let correct = options.iter().filter(|o| o.is_correct).count();
    if correct != 1 {
        return Err(validator::ValidationError::new("exactly_one_correct_option"));
    }
    Ok(())
}

fn validate_difficulty(difficulty: &str) -> Result<(), validator::ValidationError> {
    match difficulty {
        "easy" | "medium" | "hard" => Ok(()),
        _ => Err(validator::ValidationError::new("unknown_difficulty")),
    }
}

/// Staff view of a quiz.
#[derive(Debug, Serialize)]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<QuestionWithOptions>,
}

/// Query parameters for the staff listing: timed quizzes by default.
#[derive(Debug, Deserialize)]
pub struct QuizKindFilter {
    #[serde(default)]
    pub homework: bool,
}

/// Query parameters for student listings.
#[derive(Debug, Deserialize)]
pub struct CourseFilter {
    pub course_id: Option<i64>,
}

/// Response of starting (or resuming) a quiz.
#[derive(Debug, Serialize, ToSchema)]
pub struct StartQuizResponse {
    pub quiz: Quiz,
    /// `None` for staff previews, which never persist an attempt.
    pub attempt: Option<Attempt>,
    /// Seconds left in the time window, `None` when the quiz is untimed.
    pub remaining_seconds: Option<i64>,
    pub questions: Vec<PublicQuestion>,
}

/// DTO for submitting quiz answers.
/// Keys are `question_<id>`, values the selected option id.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitQuizRequest {
    #[serde(default)]
    pub answers: HashMap<String, String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitQuizResponse {
    pub attempt_id: Option<i64>,
    pub score: i64,
    pub total: i64,
}

/// Answers given and answered correctly within one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct Accuracy {
    pub total: i64,
    pub correct: i64,
}

/// A student's accuracy over all submitted answers, by topic and by difficulty.
#[derive(Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StudentAnalytics {
    pub topics: BTreeMap<String, Accuracy>,
    pub difficulty: BTreeMap<String, Accuracy>,
}

/// Staff overview of everything handed in for a quiz.
#[derive(Debug, Serialize)]
pub struct QuizResults {
    pub quiz: Quiz,
    pub attempts: Vec<Attempt>,
    pub submissions: Vec<HomeworkSubmission>,
}
