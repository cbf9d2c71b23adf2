// src/openapi.rs

use axum::Json;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::handlers::{auth, homework, questionnaire, quiz};

/// OpenAPI document for the client-facing endpoints.
#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login,
        auth::me,
        quiz::start_quiz,
        quiz::submit_quiz,
        quiz::student_analytics,
        homework::list_homework,
        homework::get_homework,
        homework::submit_homework,
        homework::grade_submission,
        questionnaire::get_questionnaire,
        questionnaire::submit_questionnaire,
        questionnaire::list_combinations,
        questionnaire::latest_result,
        questionnaire::get_result,
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Login and current user"),
        (name = "quizzes", description = "Timed quiz attempts"),
        (name = "homework", description = "Homework hand-ins and grading"),
        (name = "questionnaire", description = "Subject combination recommendations")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
