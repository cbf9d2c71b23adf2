// src/handlers/auth.rs

use axum::{
    Json,
    extract::{Extension, State},
    response::IntoResponse,
};
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{LoginRequest, LoginResponse, MeResponse, User},
    services::roster,
    utils::{
        hash::verify_password,
        jwt::{Claims, sign_jwt},
    },
};

/// Authenticates a user and returns a JWT token.
///
/// Every login opens a fresh server-side session; its id travels in the
/// token's `sid` claim.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Wrong username or password")
    ),
    tag = "auth"
)]
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password, role, created_at FROM users WHERE username = ?",
    )
    .bind(&payload.username)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::from(e)
    })?;

    let user = user.ok_or(AppError::AuthError("Invalid username or password".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError("Invalid username or password".to_string()));
    }

    let session_id = Uuid::new_v4().to_string();
    let token = sign_jwt(
        user.id,
        &user.role,
        &session_id,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    tracing::info!("User {} logged in", user.id);

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        role: user.role,
    }))
}

/// Returns the current user and, for students, the linked profile.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses((status = 200, description = "Current user", body = MeResponse)),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password, role, created_at FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    let student = roster::find_student_by_user(&pool, user.id).await?;

    Ok(Json(MeResponse {
        id: user.id,
        username: user.username,
        role: user.role,
        student_id: student.as_ref().map(|s| s.id),
        group_id: student.and_then(|s| s.group_id),
    }))
}
