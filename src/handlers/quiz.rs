// src/handlers/quiz.rs

use axum::{
    Json,
    extract::{Extension, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::quiz::{
        CourseFilter, CreateQuestionRequest, CreateQuizRequest, PublicQuestion, QuestionWithOptions,
        Quiz, QuizDetail, QuizKindFilter, QuizOption, QuizQuestion, QuizResults, StartQuizResponse,
        StudentAnalytics, SubmitQuizRequest, SubmitQuizResponse,
    },
    services::{
        analytics,
        attempts::{self, Actor},
        homework::{self, UploadedFile},
        quizzes, roster,
        session::SessionContext,
    },
    state::AppState,
    utils::{
        html::{clean_html, clean_optional},
        jwt::Claims,
    },
};

/// Resolves who is taking a quiz. Students must see the quiz through their
/// group's courses; staff get a preview.
async fn resolve_actor(pool: &SqlitePool, claims: &Claims, quiz: &Quiz) -> Result<Actor, AppError> {
    if claims.is_staff() {
        return Ok(Actor::Preview);
    }

    let student = roster::require_student(pool, claims).await?;
    if !quiz.is_published {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }
    roster::ensure_course_access(pool, &student, quiz.course_id).await?;

    Ok(Actor::Student(student))
}

/// Staff listing of quizzes (`?homework=true` for assignments).
pub async fn list_quizzes(
    State(pool): State<SqlitePool>,
    Query(filter): Query<QuizKindFilter>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = quizzes::list_all(&pool, filter.homework).await?;
    Ok(Json(quizzes))
}

/// Creates a timed quiz or a homework assignment.
pub async fn create_quiz(
    State(state): State<AppState>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let course_exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses WHERE id = ?")
        .bind(payload.course_id)
        .fetch_one(&state.pool)
        .await?;
    if course_exists == 0 {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        "INSERT INTO quizzes \
             (title, course_id, is_published, duration_minutes, is_homework, homework_text, due_at, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
        quizzes::QUIZ_COLUMNS
    ))
    .bind(clean_html(payload.title.trim()))
    .bind(payload.course_id)
    .bind(payload.is_published)
    .bind(payload.duration_minutes)
    .bind(payload.is_homework)
    .bind(clean_optional(payload.homework_text.as_deref()))
    .bind(payload.due_at)
    .bind(state.clock.now())
    .fetch_one(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz: {:?}", e);
        AppError::from(e)
    })?;

    tracing::info!("Created quiz {} (homework: {})", quiz.id, quiz.is_homework);
    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Staff view with questions and correct answers.
pub async fn get_quiz(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = quizzes::load_quiz(&pool, id).await?;
    let questions = quizzes::load_questions(&pool, id).await?;

    Ok(Json(QuizDetail { quiz, questions }))
}

/// Adds a question with 2 to 4 options, exactly one of them correct.
pub async fn add_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let quiz = quizzes::load_quiz(&pool, id).await?;
    if quiz.is_homework {
        return Err(AppError::BadRequest(
            "Homework assignments have no questions".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let question = sqlx::query_as::<_, QuizQuestion>(
        r#"
        INSERT INTO quiz_questions (quiz_id, text, topic, difficulty)
        VALUES (?, ?, ?, ?)
        RETURNING id, quiz_id, text, topic, difficulty
        "#,
    )
    .bind(quiz.id)
    .bind(clean_html(payload.text.trim()))
    .bind(clean_optional(payload.topic.as_deref()))
    .bind(&payload.difficulty)
    .fetch_one(&mut *tx)
    .await?;

    let mut options = Vec::with_capacity(payload.options.len());
    for option in &payload.options {
        let inserted = sqlx::query_as::<_, QuizOption>(
            r#"
            INSERT INTO quiz_options (question_id, text, is_correct)
            VALUES (?, ?, ?)
            RETURNING id, question_id, text, is_correct
            "#,
        )
        .bind(question.id)
        .bind(clean_html(option.text.trim()))
        .bind(option.is_correct)
        .fetch_one(&mut *tx)
        .await?;
        options.push(inserted);
    }

    tx.commit().await.map_err(|e| {
        tracing::error!("Failed to add question to quiz {}: {:?}", quiz.id, e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(QuestionWithOptions { question, options })))
}

/// Attaches a file (multipart field `file`) to a homework assignment.
pub async fn upload_attachment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let quiz = quizzes::load_quiz(&state.pool, id).await?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            upload = Some(UploadedFile {
                filename,
                bytes: bytes.to_vec(),
            });
        }
    }
    let upload = upload.ok_or(AppError::BadRequest("Missing 'file' field".to_string()))?;

    let quiz = homework::attach_assignment_file(
        &state.pool,
        &state.config.homework_dir(),
        &quiz,
        upload,
    )
    .await?;

    Ok(Json(quiz))
}

/// Flips publication of a quiz.
pub async fn toggle_publish(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        "UPDATE quizzes SET is_published = NOT is_published WHERE id = ? RETURNING {}",
        quizzes::QUIZ_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    tracing::info!("Quiz {} published: {}", quiz.id, quiz.is_published);
    Ok(Json(quiz))
}

/// Attempts and homework submissions of a quiz.
pub async fn quiz_results(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = quizzes::load_quiz(&pool, id).await?;
    let attempts = attempts::list_for_quiz(&pool, id).await?;
    let submissions = homework::list_for_quiz(&pool, id).await?;

    Ok(Json(QuizResults {
        quiz,
        attempts,
        submissions,
    }))
}

/// Published timed quizzes of the caller's courses (`?course_id=` narrows to one course).
pub async fn available_quizzes(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<CourseFilter>,
) -> Result<impl IntoResponse, AppError> {
    let student = roster::require_student(&pool, &claims).await?;

    let course_ids = match filter.course_id {
        Some(course_id) => {
            roster::ensure_course_access(&pool, &student, course_id).await?;
            vec![course_id]
        }
        None => roster::course_ids(&pool, &student).await?,
    };

    let quizzes = quizzes::list_published(&pool, &course_ids, false).await?;
    Ok(Json(quizzes))
}

/// The caller's accuracy by question topic and difficulty.
#[utoipa::path(
    get,
    path = "/api/quizzes/analytics",
    responses(
        (status = 200, description = "Accuracy by topic and difficulty", body = StudentAnalytics),
        (status = 403, description = "Caller has no student profile")
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
pub async fn student_analytics(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student = roster::require_student(&pool, &claims).await?;
    let analytics = analytics::for_student(&pool, student.id).await?;
    Ok(Json(analytics))
}

/// Starts a quiz, or resumes the attempt already running in this session.
#[utoipa::path(
    post,
    path = "/api/quizzes/{id}/start",
    params(("id" = i64, Path, description = "Quiz id")),
    responses(
        (status = 200, description = "Attempt started or resumed", body = StartQuizResponse),
        (status = 403, description = "Quiz is outside the student's courses"),
        (status = 404, description = "Quiz not found")
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
pub async fn start_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = quizzes::load_quiz(&state.pool, id).await?;
    let actor = resolve_actor(&state.pool, &claims, &quiz).await?;
    let ctx = SessionContext::from_claims(&claims);

    let outcome = attempts::start(
        &state.pool,
        state.sessions.as_ref(),
        &ctx,
        &quiz,
        &actor,
        state.clock.now(),
    )
    .await?;

    let questions = quizzes::load_questions(&state.pool, id).await?;

    Ok(Json(StartQuizResponse {
        quiz,
        attempt: outcome.attempt,
        remaining_seconds: outcome.remaining_seconds,
        questions: questions.iter().map(PublicQuestion::from).collect(),
    }))
}

/// Scores submitted answers; for students this finishes the running attempt.
#[utoipa::path(
    post,
    path = "/api/quizzes/{id}/submit",
    params(("id" = i64, Path, description = "Quiz id")),
    request_body = SubmitQuizRequest,
    responses(
        (status = 200, description = "Answers scored", body = SubmitQuizResponse),
        (status = 400, description = "Malformed selection"),
        (status = 404, description = "Quiz or option not found")
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
pub async fn submit_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = quizzes::load_quiz(&state.pool, id).await?;
    let actor = resolve_actor(&state.pool, &claims, &quiz).await?;
    let questions = quizzes::load_questions(&state.pool, id).await?;
    let ctx = SessionContext::from_claims(&claims);

    let outcome = attempts::submit(
        &state.pool,
        state.sessions.as_ref(),
        &ctx,
        &quiz,
        &questions,
        &actor,
        &payload.answers,
        state.clock.now(),
    )
    .await?;

    Ok(Json(SubmitQuizResponse {
        attempt_id: outcome.attempt_id,
        score: outcome.score,
        total: outcome.total,
    }))
}
