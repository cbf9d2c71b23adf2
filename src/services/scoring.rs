// src/services/scoring.rs

//! Turns questionnaire answers into per-combination scores.

use std::collections::BTreeSet;

use sqlx::{SqlitePool, types::Json};

use crate::{
    catalog::{Catalog, WeightTable},
    error::AppError,
    models::questionnaire::RankedCombination,
};

/// How many combinations are recommended.
pub const TOP_N: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreOutcome {
    pub scores: WeightTable,
    pub top3: Vec<RankedCombination>,
}

/// Sums the weights of the chosen answers.
pub fn aggregate<'a, I>(weights: I) -> WeightTable
where
    I: IntoIterator<Item = &'a WeightTable>,
{
    let mut scores = WeightTable::new();
    for w in weights {
        scores.accumulate(w);
    }
    scores
}

/// Every combination by descending score; equal scores keep catalog order.
pub fn rank(catalog: &Catalog, scores: &WeightTable) -> Vec<RankedCombination> {
    let mut ranked: Vec<RankedCombination> = catalog
        .all_keys()
        .map(|key| RankedCombination {
            key,
            score: scores.get(key),
        })
        .collect();

    // `sort_by` is stable.
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

pub fn top_n(catalog: &Catalog, scores: &WeightTable, n: usize) -> Vec<RankedCombination> {
    let mut ranked = rank(catalog, scores);
    ranked.truncate(n);
    ranked
}

/// Scores a set of selected answer ids. Ids are de-duplicated; unknown ids add nothing.
pub async fn score(
    pool: &SqlitePool,
    catalog: &Catalog,
    answer_ids: &[i64],
) -> Result<ScoreOutcome, AppError> {
    let ids: BTreeSet<i64> = answer_ids.iter().copied().collect();
    if ids.is_empty() {
        return Ok(ScoreOutcome {
            scores: WeightTable::new(),
            top3: Vec::new(),
        });
    }

    let mut query_builder =
        sqlx::QueryBuilder::<sqlx::Sqlite>::new("SELECT weights FROM questionnaire_answers WHERE id IN (");
    let mut separated = query_builder.separated(",");
    for id in &ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let weights: Vec<WeightTable> = query_builder
        .build_query_scalar::<Json<WeightTable>>()
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|Json(w)| w)
        .collect();

    let scores = aggregate(&weights);
    Ok(ScoreOutcome {
        top3: top_n(catalog, &scores, TOP_N),
        scores,
    })
}
