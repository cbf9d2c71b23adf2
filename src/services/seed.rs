// src/services/seed.rs

//! Keeps the questionnaire tables in line with the bundled question set.
//!
//! Questions and answers are matched by exact text. Existing rows keep their
//! ids, so stored results stay meaningful across re-seeds.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use sqlx::{Sqlite, SqlitePool, Transaction, types::Json};

use crate::{catalog::WeightTable, error::AppError};

const BUILTIN_SEED: &str = include_str!("../../data/questionnaire_seed.json");

#[derive(Debug, Clone, Deserialize)]
pub struct SeedAnswer {
    pub text: String,
    #[serde(default)]
    pub weights: WeightTable,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedQuestion {
    pub text: String,
    pub answers: Vec<SeedAnswer>,
}

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub questions_created: usize,
    pub answers_created: usize,
    pub answers_updated: usize,
    pub answers_deleted: usize,
}

impl SeedReport {
    pub fn is_noop(&self) -> bool {
        *self == SeedReport::default()
    }
}

/// The question set shipped with the binary.
pub fn builtin_seed() -> Result<Vec<SeedQuestion>, AppError> {
    serde_json::from_str(BUILTIN_SEED).map_err(|e| {
        tracing::error!("Bundled questionnaire seed is invalid: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })
}

/// Reconciles the stored questionnaire with [`builtin_seed`].
pub async fn ensure_builtin_seed(pool: &SqlitePool) -> Result<SeedReport, AppError> {
    let desired = builtin_seed()?;
    ensure_seed(pool, &desired).await
}

/// Brings stored questions and answers in line with `desired`.
///
/// Missing questions are created, answers no longer listed are removed,
/// listed answers are created or have their weights overwritten. Everything
/// happens in one transaction; running it twice changes nothing the second time.
pub async fn ensure_seed(pool: &SqlitePool, desired: &[SeedQuestion]) -> Result<SeedReport, AppError> {
    let mut tx = pool.begin().await?;
    let mut report = SeedReport::default();

    let existing: HashMap<String, i64> =
        sqlx::query_as::<_, (i64, String)>("SELECT id, text FROM questionnaire_questions")
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(|(id, text)| (text, id))
            .collect();

    for question in desired {
        let question_id = match existing.get(&question.text) {
            Some(id) => *id,
            None => {
                report.questions_created += 1;
                sqlx::query_scalar::<_, i64>(
                    "INSERT INTO questionnaire_questions (text) VALUES (?) RETURNING id",
                )
                .bind(&question.text)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        reconcile_answers(&mut tx, question_id, &question.answers, &mut report).await?;
    }

    tx.commit().await.map_err(|e| {
        tracing::error!("Failed to commit questionnaire seed: {:?}", e);
        AppError::from(e)
    })?;

    Ok(report)
}

async fn reconcile_answers(
    tx: &mut Transaction<'_, Sqlite>,
    question_id: i64,
    desired: &[SeedAnswer],
    report: &mut SeedReport,
) -> Result<(), AppError> {
    // A repeated text keeps its first position and its last weights.
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut unique: Vec<&SeedAnswer> = Vec::with_capacity(desired.len());
    for answer in desired {
        match position.get(answer.text.as_str()) {
            Some(&i) => unique[i] = answer,
            None => {
                position.insert(answer.text.as_str(), unique.len());
                unique.push(answer);
            }
        }
    }
    let desired = unique;

    let stored = sqlx::query_as::<_, (i64, String, Json<WeightTable>)>(
        "SELECT id, text, weights FROM questionnaire_answers WHERE question_id = ? ORDER BY id",
    )
    .bind(question_id)
    .fetch_all(&mut **tx)
    .await?;

    let wanted: HashSet<&str> = desired.iter().map(|a| a.text.as_str()).collect();
    let mut current: HashMap<String, (i64, WeightTable)> = HashMap::new();

    for (id, text, Json(weights)) in stored {
        if !wanted.contains(text.as_str()) || current.contains_key(&text) {
            sqlx::query("DELETE FROM questionnaire_answers WHERE id = ?")
                .bind(id)
                .execute(&mut **tx)
                .await?;
            report.answers_deleted += 1;
        } else {
            current.insert(text, (id, weights));
        }
    }

    for answer in desired {
        match current.get(&answer.text) {
            Some((_, weights)) if *weights == answer.weights => {}
            Some((id, _)) => {
                sqlx::query("UPDATE questionnaire_answers SET weights = ? WHERE id = ?")
                    .bind(Json(answer.weights))
                    .bind(id)
                    .execute(&mut **tx)
                    .await?;
                report.answers_updated += 1;
            }
            None => {
                sqlx::query(
                    "INSERT INTO questionnaire_answers (question_id, text, weights) VALUES (?, ?, ?)",
                )
                .bind(question_id)
                .bind(&answer.text)
                .bind(Json(answer.weights))
                .execute(&mut **tx)
                .await?;
                report.answers_created += 1;
            }
        }
    }

    Ok(())
}
