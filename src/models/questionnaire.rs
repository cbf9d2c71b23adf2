// src/models/questionnaire.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use utoipa::ToSchema;

use crate::catalog::{Combination, Specialty, WeightTable};

/// Represents the 'questionnaire_questions' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuestionnaireQuestion {
    pub id: i64,
    pub text: String,
}

/// Represents the 'questionnaire_answers' table.
/// `weights` is stored as a JSON object keyed by combination.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuestionnaireAnswer {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub weights: Json<WeightTable>,
}

/// One entry of the ranked top list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RankedCombination {
    pub key: Combination,
    pub score: i64,
}

/// Represents the 'questionnaire_results' table. Immutable once written.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuestionnaireResult {
    pub id: i64,
    pub user_id: Option<i64>,
    pub scores: Json<WeightTable>,
    pub top_combinations: Json<Vec<RankedCombination>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublicAnswer {
    pub id: i64,
    pub text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublicQuestionnaireQuestion {
    pub id: i64,
    pub text: String,
    pub answers: Vec<PublicAnswer>,
}

/// DTO for submitting the questionnaire.
/// Keys are `question_<id>`, values the chosen answer id; every question must be answered.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitQuestionnaireRequest {
    #[serde(default)]
    pub answers: HashMap<String, String>,
}

/// A top-ranked combination joined with its catalog guidance.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecommendationView {
    pub key: Combination,
    pub title: String,
    pub score: i64,
    pub description: String,
    pub careers: Vec<String>,
    pub faculties: Vec<String>,
    pub specialties: Vec<Specialty>,
    pub best_specialty: Option<Specialty>,
}

/// Result page: the enriched top list plus every score in ranked order.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionnaireResultView {
    pub id: i64,
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub top: Vec<RecommendationView>,
    pub sorted_scores: Vec<RankedCombination>,
}
