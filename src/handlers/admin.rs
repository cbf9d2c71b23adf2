// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        roster::{Course, CreateCourseRequest, CreateGroupRequest, CreateStudentRequest, Group, Student},
        user::{CreateUserRequest, ROLE_STUDENT, User},
    },
    state::AppState,
    utils::{hash::hash_password, html::clean_optional},
};

async fn insert_user(
    conn: &mut SqliteConnection,
    username: &str,
    password: &str,
    role: &str,
    now: DateTime<Utc>,
) -> Result<User, AppError> {
    let hashed_password = hash_password(password)?;

    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, password, role, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING id, username, password, role, created_at
        "#,
    )
    .bind(username)
    .bind(hashed_password)
    .bind(role)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| AppError::from_insert(e, format!("Username '{}' already exists", username)))
}

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(
        "SELECT id, username, password, role, created_at FROM users ORDER BY id DESC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(users))
}

/// Creates a new user with specific role.
/// Admin only.
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut conn = state.pool.acquire().await?;
    let user = insert_user(
        &mut conn,
        &payload.username,
        &payload.password,
        &payload.role,
        state.clock.now(),
    )
    .await?;

    tracing::info!("Created {} account {}", user.role, user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_courses(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let courses = sqlx::query_as::<_, Course>("SELECT id, title, description FROM courses ORDER BY title")
        .fetch_all(&pool)
        .await?;

    Ok(Json(courses))
}

pub async fn create_course(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let course = sqlx::query_as::<_, Course>(
        "INSERT INTO courses (title, description) VALUES (?, ?) RETURNING id, title, description",
    )
    .bind(payload.title.trim())
    .bind(clean_optional(payload.description.as_deref()))
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create course: {:?}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn list_groups(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let groups = sqlx::query_as::<_, Group>("SELECT id, name, description FROM student_groups ORDER BY name")
        .fetch_all(&pool)
        .await?;

    Ok(Json(groups))
}

pub async fn create_group(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let name = payload.name.trim().to_string();
    let group = sqlx::query_as::<_, Group>(
        "INSERT INTO student_groups (name, description) VALUES (?, ?) RETURNING id, name, description",
    )
    .bind(&name)
    .bind(clean_optional(payload.description.as_deref()))
    .fetch_one(&pool)
    .await
    .map_err(|e| AppError::from_insert(e, format!("Group '{}' already exists", name)))?;

    Ok((StatusCode::CREATED, Json(group)))
}

/// Registers a group to a course, giving its students access to the course's quizzes.
/// Registering twice is a no-op.
pub async fn register_group_course(
    State(pool): State<SqlitePool>,
    Path((group_id, course_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let group_exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM student_groups WHERE id = ?")
        .bind(group_id)
        .fetch_one(&pool)
        .await?;
    if group_exists == 0 {
        return Err(AppError::NotFound("Group not found".to_string()));
    }

    let course_exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses WHERE id = ?")
        .bind(course_id)
        .fetch_one(&pool)
        .await?;
    if course_exists == 0 {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    sqlx::query("INSERT OR IGNORE INTO group_courses (group_id, course_id) VALUES (?, ?)")
        .bind(group_id)
        .bind(course_id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to register group to course: {:?}", e);
            AppError::from(e)
        })?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn unregister_group_course(
    State(pool): State<SqlitePool>,
    Path((group_id, course_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM group_courses WHERE group_id = ? AND course_id = ?")
        .bind(group_id)
        .bind(course_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Registration not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_students(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let students = sqlx::query_as::<_, Student>(
        "SELECT id, name, email, user_id, group_id FROM students ORDER BY name",
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(students))
}

/// Creates a student profile, optionally together with a student login.
/// Admin only.
pub async fn create_student(
    State(state): State<AppState>,
    Json(payload): Json<CreateStudentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let login = match (payload.username.as_deref(), payload.password.as_deref()) {
        (Some(username), Some(password)) => Some((username, password)),
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest(
                "Username and password must be given together".to_string(),
            ));
        }
    };

    let mut tx = state.pool.begin().await?;

    if let Some(group_id) = payload.group_id {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM student_groups WHERE id = ?")
            .bind(group_id)
            .fetch_one(&mut *tx)
            .await?;
        if exists == 0 {
            return Err(AppError::NotFound("Group not found".to_string()));
        }
    }

    let user_id = match login {
        Some((username, password)) => {
            let user = insert_user(&mut tx, username, password, ROLE_STUDENT, state.clock.now()).await?;
            Some(user.id)
        }
        None => None,
    };

    let email = payload.email.trim().to_lowercase();
    let student = sqlx::query_as::<_, Student>(
        r#"
        INSERT INTO students (name, email, user_id, group_id)
        VALUES (?, ?, ?, ?)
        RETURNING id, name, email, user_id, group_id
        "#,
    )
    .bind(payload.name.trim())
    .bind(&email)
    .bind(user_id)
    .bind(payload.group_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| AppError::from_insert(e, format!("A student with email '{}' already exists", email)))?;

    tx.commit().await?;

    tracing::info!("Created student {} (login: {:?})", student.id, user_id);
    Ok((StatusCode::CREATED, Json(student)))
}
