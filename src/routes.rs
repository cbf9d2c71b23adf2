// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::MAX_UPLOAD_BYTES,
    handlers::{admin, auth, homework, questionnaire, quiz},
    openapi,
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, staff_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, admin, quizzes, homework, questionnaire).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_layer = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .layer(auth_layer.clone()),
        );

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route("/courses", get(admin::list_courses).post(admin::create_course))
        .route("/groups", get(admin::list_groups).post(admin::create_group))
        .route(
            "/groups/{group_id}/courses/{course_id}",
            post(admin::register_group_course).delete(admin::unregister_group_course),
        )
        .route("/students", get(admin::list_students).post(admin::create_student))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(auth_layer.clone());

    let quiz_routes = Router::new()
        .route("/available", get(quiz::available_quizzes))
        .route("/analytics", get(quiz::student_analytics))
        .route("/{id}/start", post(quiz::start_quiz))
        .route("/{id}/submit", post(quiz::submit_quiz))
        .layer(auth_layer.clone())
        // Staff-only management
        .merge(
            Router::new()
                .route("/", get(quiz::list_quizzes).post(quiz::create_quiz))
                .route("/{id}", get(quiz::get_quiz))
                .route("/{id}/questions", post(quiz::add_question))
                .route("/{id}/publish", post(quiz::toggle_publish))
                .route(
                    "/{id}/attachment",
                    post(quiz::upload_attachment).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
                )
                .route("/{id}/results", get(quiz::quiz_results))
                .layer(middleware::from_fn(staff_middleware))
                .layer(auth_layer.clone()),
        );

    let homework_routes = Router::new()
        .route("/", get(homework::list_homework))
        .route("/{quiz_id}", get(homework::get_homework))
        .route(
            "/{quiz_id}/submissions",
            post(homework::submit_homework).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/{quiz_id}/attachment", get(homework::download_assignment_file))
        .route("/submissions/{id}/file", get(homework::download_submission_file))
        .layer(auth_layer.clone())
        .merge(
            Router::new()
                .route("/submissions/{id}/grade", put(homework::grade_submission))
                .layer(middleware::from_fn(staff_middleware))
                .layer(auth_layer.clone()),
        );

    let questionnaire_routes = Router::new()
        .route(
            "/",
            get(questionnaire::get_questionnaire).post(questionnaire::submit_questionnaire),
        )
        .route("/combinations", get(questionnaire::list_combinations))
        .route("/results/latest", get(questionnaire::latest_result))
        .route("/results/{id}", get(questionnaire::get_result))
        .layer(auth_layer);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/homework", homework_routes)
        .nest("/api/questionnaire", questionnaire_routes)
        .route("/api/openapi.json", get(openapi::openapi_json))
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
