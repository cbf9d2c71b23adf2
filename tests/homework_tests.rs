// tests/homework_tests.rs

mod common;

use chrono::Duration;
use common::{TestApp, spawn_app, test_now};
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};

struct HomeworkFixture {
    quiz_id: i64,
    teacher: String,
    student: String,
    classmate: String,
}

/// Published homework due two days after `test_now`.
async fn assignment(app: &TestApp) -> HomeworkFixture {
    let admin = app.admin_token().await;
    let course = app.create_course(&admin, "Literature").await;
    let group = app.create_group(&admin, "10A", &[course]).await;
    let (_, student) = app.create_student(&admin, "timur", Some(group)).await;
    let (_, classmate) = app.create_student(&admin, "saule", Some(group)).await;
    let teacher = app.create_user(&admin, "teacher", "teacher").await;

    let response = app
        .post_json(
            &teacher,
            "/api/quizzes",
            json!({
                "title": "Essay on Abai",
                "course_id": course,
                "is_published": true,
                "is_homework": true,
                "homework_text": "<p>Two pages</p><script>alert(1)</script>",
                "due_at": test_now() + Duration::days(2)
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["homework_text"], "<p>Two pages</p>");

    HomeworkFixture {
        quiz_id: body["id"].as_i64().unwrap(),
        teacher,
        student,
        classmate,
    }
}

async fn hand_in(app: &TestApp, token: &str, quiz_id: i64, form: Form) -> reqwest::Response {
    app.client
        .post(app.url(&format!("/api/homework/{}/submissions", quiz_id)))
        .bearer_auth(token)
        .multipart(form)
        .send()
        .await
        .expect("Failed to execute request")
}

fn with_file(name: &str, bytes: &[u8]) -> Form {
    Form::new().part("file", Part::bytes(bytes.to_vec()).file_name(name.to_string()))
}

#[tokio::test]
async fn listing_shows_remaining_time() {
    let app = spawn_app().await;
    let fx = assignment(&app).await;

    let body: Value = app.get(&fx.student, "/api/homework").await.json().await.unwrap();

    let listed = body.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["quiz"]["id"], fx.quiz_id);
    assert_eq!(listed[0]["is_late"], false);
    assert_eq!(listed[0]["remaining_seconds"], 2 * 24 * 3600);
}

#[tokio::test]
async fn on_time_submission_is_stored_and_shown() {
    let app = spawn_app().await;
    let fx = assignment(&app).await;

    let response = hand_in(
        &app,
        &fx.student,
        fx.quiz_id,
        with_file("essay.pdf", b"%PDF-1.4").text("text", "See attached"),
    )
    .await;
    assert_eq!(response.status().as_u16(), 201);
    let saved: Value = response.json().await.unwrap();
    assert_eq!(saved["original_filename"], "essay.pdf");
    assert!(saved.get("file_path").is_none());

    let view: Value = app
        .get(&fx.student, &format!("/api/homework/{}", fx.quiz_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(view["is_late"], false);
    assert_eq!(view["submission"]["id"], saved["id"]);
    assert_eq!(view["submission"]["text"], "See attached");

    let stored = std::fs::read_dir(app.uploads.path().join("homework")).unwrap().count();
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn late_submission_is_rejected() {
    let app = spawn_app().await;
    let fx = assignment(&app).await;
    app.clock.set(test_now() + Duration::days(3));

    let response = hand_in(
        &app,
        &fx.student,
        fx.quiz_id,
        Form::new().text("text", "Sorry it's late"),
    )
    .await;

    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(app.count("homework_submissions").await, 0);

    let view: Value = app
        .get(&fx.student, &format!("/api/homework/{}", fx.quiz_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(view["is_late"], true);
    assert_eq!(view["remaining_seconds"], 0);
}

#[tokio::test]
async fn disallowed_file_type_is_rejected() {
    let app = spawn_app().await;
    let fx = assignment(&app).await;

    let response = hand_in(&app, &fx.student, fx.quiz_id, with_file("setup.exe", b"MZ")).await;

    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(app.count("homework_submissions").await, 0);
}

#[tokio::test]
async fn empty_submission_is_rejected() {
    let app = spawn_app().await;
    let fx = assignment(&app).await;

    let response = hand_in(&app, &fx.student, fx.quiz_id, Form::new().text("text", "  ")).await;

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn resubmission_replaces_the_current_hand_in() {
    let app = spawn_app().await;
    let fx = assignment(&app).await;

    hand_in(&app, &fx.student, fx.quiz_id, Form::new().text("text", "draft")).await;
    app.clock.advance(Duration::hours(1));
    hand_in(&app, &fx.student, fx.quiz_id, Form::new().text("text", "final")).await;

    let view: Value = app
        .get(&fx.student, &format!("/api/homework/{}", fx.quiz_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(view["submission"]["text"], "final");
    assert_eq!(app.count("homework_submissions").await, 2);
}

#[tokio::test]
async fn grading_sets_and_clears_the_score() {
    let app = spawn_app().await;
    let fx = assignment(&app).await;
    let saved: Value = hand_in(&app, &fx.student, fx.quiz_id, Form::new().text("text", "answer"))
        .await
        .json()
        .await
        .unwrap();
    let grade_url = app.url(&format!("/api/homework/submissions/{}/grade", saved["id"]));

    let graded: Value = app
        .client
        .put(&grade_url)
        .bearer_auth(&fx.teacher)
        .json(&json!({ "score": "85" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(graded["score"], 85);

    let bad = app
        .client
        .put(&grade_url)
        .bearer_auth(&fx.teacher)
        .json(&json!({ "score": "excellent" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status().as_u16(), 400);

    for odd in [json!(4.5), json!(true)] {
        let response = app
            .client
            .put(&grade_url)
            .bearer_auth(&fx.teacher)
            .json(&json!({ "score": odd }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].is_string());
    }

    let cleared: Value = app
        .client
        .put(&grade_url)
        .bearer_auth(&fx.teacher)
        .json(&json!({ "score": "" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(cleared["score"].is_null());

    let by_student = app
        .client
        .put(&grade_url)
        .bearer_auth(&fx.student)
        .json(&json!({ "score": 100 }))
        .send()
        .await
        .unwrap();
    assert_eq!(by_student.status().as_u16(), 403);
}

#[tokio::test]
async fn file_download_is_limited_to_owner_and_staff() {
    let app = spawn_app().await;
    let fx = assignment(&app).await;
    let saved: Value = hand_in(&app, &fx.student, fx.quiz_id, with_file("notes.txt", b"my notes"))
        .await
        .json()
        .await
        .unwrap();
    let file_url = format!("/api/homework/submissions/{}/file", saved["id"]);

    let own = app.get(&fx.student, &file_url).await;
    assert_eq!(own.status().as_u16(), 200);
    assert_eq!(
        own.headers()["content-disposition"],
        "attachment; filename=\"notes.txt\""
    );
    assert_eq!(own.bytes().await.unwrap().as_ref(), b"my notes");

    let teacher = app.get(&fx.teacher, &file_url).await;
    assert_eq!(teacher.status().as_u16(), 200);

    let classmate = app.get(&fx.classmate, &file_url).await;
    assert_eq!(classmate.status().as_u16(), 403);
}

#[tokio::test]
async fn teacher_attachment_reaches_students_of_the_course() {
    let app = spawn_app().await;
    let fx = assignment(&app).await;
    let upload_url = app.url(&format!("/api/quizzes/{}/attachment", fx.quiz_id));

    let rejected = app
        .client
        .post(&upload_url)
        .bearer_auth(&fx.teacher)
        .multipart(with_file("tool.exe", b"MZ"))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status().as_u16(), 400);

    let by_student = app
        .client
        .post(&upload_url)
        .bearer_auth(&fx.student)
        .multipart(with_file("task.pdf", b"%PDF"))
        .send()
        .await
        .unwrap();
    assert_eq!(by_student.status().as_u16(), 403);

    let uploaded = app
        .client
        .post(&upload_url)
        .bearer_auth(&fx.teacher)
        .multipart(with_file("task.pdf", b"%PDF task"))
        .send()
        .await
        .unwrap();
    assert_eq!(uploaded.status().as_u16(), 200);
    let quiz: Value = uploaded.json().await.unwrap();
    assert_eq!(quiz["attachment_filename"], "task.pdf");
    assert!(quiz.get("attachment_path").is_none());

    let file_url = format!("/api/homework/{}/attachment", fx.quiz_id);
    let download = app.get(&fx.student, &file_url).await;
    assert_eq!(download.status().as_u16(), 200);
    assert_eq!(
        download.headers()["content-disposition"],
        "attachment; filename=\"task.pdf\""
    );
    assert_eq!(download.bytes().await.unwrap().as_ref(), b"%PDF task");

    assert_eq!(app.get(&fx.teacher, &file_url).await.status().as_u16(), 200);

    let admin = app.admin_token().await;
    let (_, outsider) = app.create_student(&admin, "outsider", None).await;
    assert_eq!(app.get(&outsider, &file_url).await.status().as_u16(), 403);
}
