// tests/questionnaire_tests.rs

mod common;

use common::{TestApp, spawn_app};
use lms_backend::services::seed;
use serde_json::{Map, Value, json};

/// Answers every question with the answer at `pick` (or the last one if shorter).
async fn fill_in(app: &TestApp, token: &str, pick: usize) -> Value {
    let questions: Value = app.get(token, "/api/questionnaire").await.json().await.unwrap();

    let answers: Map<String, Value> = questions
        .as_array()
        .unwrap()
        .iter()
        .map(|q| {
            let options = q["answers"].as_array().unwrap();
            let chosen = &options[pick.min(options.len() - 1)];
            (
                format!("question_{}", q["id"]),
                Value::String(chosen["id"].to_string()),
            )
        })
        .collect();

    json!({ "answers": answers })
}

#[tokio::test]
async fn questionnaire_is_seeded_on_first_use() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (_, student) = app.create_student(&admin, "aruzhan", None).await;

    let response = app.get(&student, "/api/questionnaire").await;
    assert_eq!(response.status().as_u16(), 200);

    let questions: Value = response.json().await.unwrap();
    let expected = seed::builtin_seed().unwrap();
    assert_eq!(questions.as_array().unwrap().len(), expected.len());
    // Weights stay on the server.
    assert!(questions[0]["answers"][0].get("weights").is_none());
}

#[tokio::test]
async fn combinations_list_the_catalog() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let body: Value = app
        .get(&admin, "/api/questionnaire/combinations")
        .await
        .json()
        .await
        .unwrap();

    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 13);
    assert_eq!(entries[0]["key"], "math_inf");
}

#[tokio::test]
async fn submission_stores_a_ranked_result() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (_, student) = app.create_student(&admin, "aruzhan", None).await;

    let form = fill_in(&app, &student, 0).await;
    let response = app.post_json(&student, "/api/questionnaire", form).await;
    assert_eq!(response.status().as_u16(), 201);

    let result: Value = response.json().await.unwrap();
    let top = result["top"].as_array().unwrap();
    let sorted = result["sorted_scores"].as_array().unwrap();

    assert_eq!(top.len(), 3);
    assert_eq!(sorted.len(), 13);
    assert!(top[0]["title"].is_string());
    assert!(top[0]["best_specialty"]["code"].is_string());
    for (t, s) in top.iter().zip(sorted) {
        assert_eq!(t["key"], s["key"]);
        assert_eq!(t["score"], s["score"]);
    }
    let scores: Vec<i64> = sorted.iter().map(|s| s["score"].as_i64().unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));

    let latest: Value = app
        .get(&student, "/api/questionnaire/results/latest")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(latest["id"], result["id"]);
}

#[tokio::test]
async fn incomplete_questionnaire_is_rejected() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (_, student) = app.create_student(&admin, "aruzhan", None).await;

    let mut form = fill_in(&app, &student, 0).await;
    let answers = form["answers"].as_object_mut().unwrap();
    let first_key = answers.keys().next().unwrap().clone();
    answers.remove(&first_key);

    let response = app.post_json(&student, "/api/questionnaire", form).await;

    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(app.count("questionnaire_results").await, 0);
}

#[tokio::test]
async fn no_result_yet_is_404() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let response = app.get(&admin, "/api/questionnaire/results/latest").await;

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn results_are_private_to_owner_and_staff() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (_, owner) = app.create_student(&admin, "owner", None).await;
    let (_, other) = app.create_student(&admin, "other", None).await;

    let form = fill_in(&app, &owner, 1).await;
    let result: Value = app
        .post_json(&owner, "/api/questionnaire", form)
        .await
        .json()
        .await
        .unwrap();
    let path = format!("/api/questionnaire/results/{}", result["id"]);

    assert_eq!(app.get(&owner, &path).await.status().as_u16(), 200);
    assert_eq!(app.get(&admin, &path).await.status().as_u16(), 200);
    assert_eq!(app.get(&other, &path).await.status().as_u16(), 403);
}
