// src/services/questionnaire.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{SqlitePool, types::Json};

use crate::{
    catalog::Catalog,
    error::AppError,
    models::questionnaire::{
        PublicAnswer, PublicQuestionnaireQuestion, QuestionnaireAnswer, QuestionnaireQuestion,
        QuestionnaireResult, QuestionnaireResultView, RecommendationView,
    },
    services::scoring,
    utils::form::parse_selections,
};

const RESULT_COLUMNS: &str = "id, user_id, scores, top_combinations, created_at";

/// Questions in id order, each with its answers. Weights stay server-side.
pub async fn load_questions(pool: &SqlitePool) -> Result<Vec<PublicQuestionnaireQuestion>, AppError> {
    let questions = sqlx::query_as::<_, QuestionnaireQuestion>(
        "SELECT id, text FROM questionnaire_questions ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let answers = sqlx::query_as::<_, QuestionnaireAnswer>(
        "SELECT id, question_id, text, weights FROM questionnaire_answers ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let mut by_question: HashMap<i64, Vec<PublicAnswer>> = HashMap::new();
    for a in answers {
        by_question.entry(a.question_id).or_default().push(PublicAnswer {
            id: a.id,
            text: a.text,
        });
    }

    Ok(questions
        .into_iter()
        .map(|q| PublicQuestionnaireQuestion {
            answers: by_question.remove(&q.id).unwrap_or_default(),
            id: q.id,
            text: q.text,
        })
        .collect())
}

/// Checks that every question is answered with one of its own answers and
/// returns the chosen answer ids.
async fn validated_answer_ids(
    pool: &SqlitePool,
    form: &HashMap<String, String>,
) -> Result<Vec<i64>, AppError> {
    let selections = parse_selections(form)?;

    let question_ids = sqlx::query_scalar::<_, i64>("SELECT id FROM questionnaire_questions ORDER BY id")
        .fetch_all(pool)
        .await?;

    let owners: HashMap<i64, i64> =
        sqlx::query_as::<_, (i64, i64)>("SELECT id, question_id FROM questionnaire_answers")
            .fetch_all(pool)
            .await?
            .into_iter()
            .collect();

    let mut chosen = Vec::with_capacity(question_ids.len());
    for question_id in question_ids {
        let answer_id = selections.get(&question_id).ok_or_else(|| {
            AppError::BadRequest(format!("Question {} is not answered", question_id))
        })?;

        if owners.get(answer_id) != Some(&question_id) {
            return Err(AppError::NotFound(format!(
                "Answer {} not found for question {}",
                answer_id, question_id
            )));
        }
        chosen.push(*answer_id);
    }

    Ok(chosen)
}

/// Scores a completed questionnaire and stores the result.
pub async fn submit(
    pool: &SqlitePool,
    catalog: &Catalog,
    user_id: Option<i64>,
    form: &HashMap<String, String>,
    now: DateTime<Utc>,
) -> Result<QuestionnaireResult, AppError> {
    let answer_ids = validated_answer_ids(pool, form).await?;
    let outcome = scoring::score(pool, catalog, &answer_ids).await?;

    let result = sqlx::query_as::<_, QuestionnaireResult>(&format!(
        "INSERT INTO questionnaire_results (user_id, scores, top_combinations, created_at) \
         VALUES (?, ?, ?, ?) RETURNING {}",
        RESULT_COLUMNS
    ))
    .bind(user_id)
    .bind(Json(outcome.scores))
    .bind(Json(&outcome.top3))
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to store questionnaire result: {:?}", e);
        AppError::from(e)
    })?;

    tracing::info!(
        "Questionnaire result {} stored for user {:?}",
        result.id,
        user_id
    );
    Ok(result)
}

pub async fn find_result(pool: &SqlitePool, result_id: i64) -> Result<QuestionnaireResult, AppError> {
    sqlx::query_as::<_, QuestionnaireResult>(&format!(
        "SELECT {} FROM questionnaire_results WHERE id = ?",
        RESULT_COLUMNS
    ))
    .bind(result_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Result not found".to_string()))
}

pub async fn latest_result(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Option<QuestionnaireResult>, AppError> {
    let result = sqlx::query_as::<_, QuestionnaireResult>(&format!(
        "SELECT {} FROM questionnaire_results WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT 1",
        RESULT_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(result)
}

/// Joins a stored result with catalog guidance.
pub fn present(catalog: &Catalog, result: &QuestionnaireResult) -> QuestionnaireResultView {
    let top = result
        .top_combinations
        .iter()
        .map(|ranked| {
            let meta = catalog.get(ranked.key);
            RecommendationView {
                key: ranked.key,
                title: meta.title.clone(),
                score: ranked.score,
                description: meta.description.clone(),
                careers: meta.careers.clone(),
                faculties: meta.faculties.clone(),
                specialties: meta.specialties.clone(),
                best_specialty: meta.best_specialty().cloned(),
            }
        })
        .collect();

    QuestionnaireResultView {
        id: result.id,
        user_id: result.user_id,
        created_at: result.created_at,
        top,
        sorted_scores: scoring::rank(catalog, &result.scores),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Combination, WeightTable};
    use crate::db;
    use crate::services::seed::{SeedAnswer, SeedQuestion, ensure_seed};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 20, 12, 0, 0).unwrap()
    }

    async fn seeded() -> (SqlitePool, Vec<PublicQuestionnaireQuestion>) {
        let pool = db::test_pool().await;
        let weights = |c: Combination, v: i64| -> WeightTable { [(c, v)].into_iter().collect() };

        ensure_seed(
            &pool,
            &[
                SeedQuestion {
                    text: "Favourite subject?".into(),
                    answers: vec![
                        SeedAnswer { text: "Maths".into(), weights: weights(Combination::MathInf, 3) },
                        SeedAnswer { text: "History".into(), weights: weights(Combination::GeoHist, 3) },
                    ],
                },
                SeedQuestion {
                    text: "Weekend plans?".into(),
                    answers: vec![
                        SeedAnswer { text: "Coding".into(), weights: weights(Combination::MathInf, 1) },
                        SeedAnswer { text: "Museum".into(), weights: weights(Combination::GeoHist, 2) },
                    ],
                },
            ],
        )
        .await
        .unwrap();

        let questions = load_questions(&pool).await.unwrap();
        (pool, questions)
    }

    fn form(pairs: &[(i64, i64)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(q, a)| (format!("question_{}", q), a.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn complete_submission_is_scored_and_stored() {
        let (pool, qs) = seeded().await;
        let catalog = Catalog::builtin().unwrap();

        let result = submit(
            &pool,
            &catalog,
            None,
            &form(&[(qs[0].id, qs[0].answers[0].id), (qs[1].id, qs[1].answers[1].id)]),
            now(),
        )
        .await
        .unwrap();

        assert_eq!(result.scores.get(Combination::MathInf), 3);
        assert_eq!(result.scores.get(Combination::GeoHist), 2);
        assert_eq!(result.top_combinations.len(), 3);
        assert_eq!(result.top_combinations[0].key, Combination::MathInf);

        let stored = find_result(&pool, result.id).await.unwrap();
        assert_eq!(stored.scores.0, result.scores.0);
    }

    #[tokio::test]
    async fn unanswered_question_is_rejected() {
        let (pool, qs) = seeded().await;
        let catalog = Catalog::builtin().unwrap();

        let err = submit(
            &pool,
            &catalog,
            None,
            &form(&[(qs[0].id, qs[0].answers[0].id)]),
            now(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn answer_of_another_question_is_not_found() {
        let (pool, qs) = seeded().await;
        let catalog = Catalog::builtin().unwrap();

        let err = submit(
            &pool,
            &catalog,
            None,
            &form(&[(qs[0].id, qs[1].answers[0].id), (qs[1].id, qs[1].answers[0].id)]),
            now(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        let stored = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM questionnaire_results")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(stored, 0);
    }

    #[tokio::test]
    async fn latest_result_is_per_user() {
        let (pool, qs) = seeded().await;
        let catalog = Catalog::builtin().unwrap();
        sqlx::query("INSERT INTO users (id, username, password, role, created_at) VALUES (7, 'aigerim', 'x', 'student', ?)")
            .bind(now())
            .execute(&pool)
            .await
            .unwrap();

        let answers = form(&[(qs[0].id, qs[0].answers[1].id), (qs[1].id, qs[1].answers[1].id)]);
        submit(&pool, &catalog, Some(7), &answers, now()).await.unwrap();
        let second = submit(&pool, &catalog, Some(7), &answers, now() + chrono::Duration::minutes(5))
            .await
            .unwrap();

        assert_eq!(latest_result(&pool, 7).await.unwrap().unwrap().id, second.id);
        assert!(latest_result(&pool, 8).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn view_enriches_the_top_list() {
        let (pool, qs) = seeded().await;
        let catalog = Catalog::builtin().unwrap();

        let result = submit(
            &pool,
            &catalog,
            None,
            &form(&[(qs[0].id, qs[0].answers[1].id), (qs[1].id, qs[1].answers[1].id)]),
            now(),
        )
        .await
        .unwrap();
        let view = present(&catalog, &result);

        assert_eq!(view.top[0].key, Combination::GeoHist);
        assert_eq!(view.top[0].score, 5);
        assert_eq!(view.top[0].title, catalog.get(Combination::GeoHist).title);
        assert!(view.top[0].best_specialty.is_some());
        assert_eq!(view.sorted_scores.len(), Combination::COUNT);
    }
}
