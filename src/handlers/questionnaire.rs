// src/handlers/questionnaire.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    catalog::CombinationMeta,
    error::AppError,
    models::questionnaire::{
        PublicQuestionnaireQuestion, QuestionnaireResultView, SubmitQuestionnaireRequest,
    },
    services::{questionnaire, seed},
    state::AppState,
    utils::jwt::Claims,
};

/// The questionnaire with its answers. Seeds the bundled questions on an empty database.
#[utoipa::path(
    get,
    path = "/api/questionnaire",
    responses((status = 200, description = "Questions with answers", body = [PublicQuestionnaireQuestion])),
    security(("bearer" = [])),
    tag = "questionnaire"
)]
pub async fn get_questionnaire(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let mut questions = questionnaire::load_questions(&state.pool).await?;

    if questions.is_empty() {
        let report = seed::ensure_builtin_seed(&state.pool).await?;
        tracing::info!("Seeded questionnaire on first use: {:?}", report);
        questions = questionnaire::load_questions(&state.pool).await?;
    }

    Ok(Json(questions))
}

/// Scores a completed questionnaire and stores the result for the caller.
#[utoipa::path(
    post,
    path = "/api/questionnaire",
    request_body = SubmitQuestionnaireRequest,
    responses(
        (status = 201, description = "Result stored", body = QuestionnaireResultView),
        (status = 400, description = "A question is unanswered or malformed"),
        (status = 404, description = "Answer does not belong to its question")
    ),
    security(("bearer" = [])),
    tag = "questionnaire"
)]
pub async fn submit_questionnaire(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SubmitQuestionnaireRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let result = questionnaire::submit(
        &state.pool,
        &state.catalog,
        Some(user_id),
        &payload.answers,
        state.clock.now(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(questionnaire::present(&state.catalog, &result)),
    ))
}

/// Every combination with its guidance, in catalog order.
#[utoipa::path(
    get,
    path = "/api/questionnaire/combinations",
    responses((status = 200, description = "The combination catalog", body = [CombinationMeta])),
    security(("bearer" = [])),
    tag = "questionnaire"
)]
pub async fn list_combinations(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.catalog.entries().to_vec())
}

#[utoipa::path(
    get,
    path = "/api/questionnaire/results/latest",
    responses(
        (status = 200, description = "The caller's most recent result", body = QuestionnaireResultView),
        (status = 404, description = "No result yet")
    ),
    security(("bearer" = [])),
    tag = "questionnaire"
)]
pub async fn latest_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let result = questionnaire::latest_result(&state.pool, claims.user_id()?)
        .await?
        .ok_or(AppError::NotFound("No questionnaire result yet".to_string()))?;

    Ok(Json(questionnaire::present(&state.catalog, &result)))
}

/// A stored result, visible to its owner and to staff.
#[utoipa::path(
    get,
    path = "/api/questionnaire/results/{id}",
    params(("id" = i64, Path, description = "Result id")),
    responses(
        (status = 200, description = "Result with recommendations", body = QuestionnaireResultView),
        (status = 403, description = "Someone else's result"),
        (status = 404, description = "Result not found")
    ),
    security(("bearer" = [])),
    tag = "questionnaire"
)]
pub async fn get_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = questionnaire::find_result(&state.pool, id).await?;

    if !claims.is_staff() && result.user_id != Some(claims.user_id()?) {
        return Err(AppError::Forbidden("Not your result".to_string()));
    }

    Ok(Json(questionnaire::present(&state.catalog, &result)))
}
