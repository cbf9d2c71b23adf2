// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use lms_backend::{
    catalog::Catalog, clock::FixedClock, config::Config, db, routes, state::AppState,
    utils::hash::hash_password,
};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tempfile::TempDir;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-password";

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub client: reqwest::Client,
    pub clock: Arc<FixedClock>,
    pub uploads: TempDir,
}

/// Monday morning of the test calendar.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 1, 9, 0, 0).unwrap()
}

/// Router over a fresh in-memory database with one admin account.
pub async fn build_app() -> (axum::Router, SqlitePool, Arc<FixedClock>, TempDir) {
    let pool = db::memory_pool()
        .await
        .expect("Failed to create in-memory database");

    sqlx::query("INSERT INTO users (username, password, role, created_at) VALUES (?, ?, 'admin', ?)")
        .bind(ADMIN_USERNAME)
        .bind(hash_password(ADMIN_PASSWORD).unwrap())
        .bind(test_now())
        .execute(&pool)
        .await
        .expect("Failed to seed admin");

    let uploads = tempfile::tempdir().expect("Failed to create upload dir");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        upload_dir: uploads.path().to_path_buf(),
        bind_addr: "127.0.0.1:0".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let clock = Arc::new(FixedClock::new(test_now()));
    let state = AppState::with_clock(
        pool.clone(),
        config,
        Catalog::builtin().unwrap(),
        clock.clone(),
    );

    (routes::create_router(state), pool, clock, uploads)
}

/// Spawns the app on a random port, backed by a fresh in-memory database.
pub async fn spawn_app() -> TestApp {
    let (app, pool, clock, uploads) = build_app().await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        pool,
        client: reqwest::Client::new(),
        clock,
        uploads,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 200, "login failed for {}", username);

        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    pub async fn post_json(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Creates a course and returns its id.
    pub async fn create_course(&self, admin: &str, title: &str) -> i64 {
        let response = self
            .post_json(admin, "/api/admin/courses", json!({ "title": title }))
            .await;
        assert_eq!(response.status().as_u16(), 201);
        response.json::<Value>().await.unwrap()["id"].as_i64().unwrap()
    }

    /// Creates a group registered to `course_ids` and returns its id.
    pub async fn create_group(&self, admin: &str, name: &str, course_ids: &[i64]) -> i64 {
        let response = self
            .post_json(admin, "/api/admin/groups", json!({ "name": name }))
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let group_id = response.json::<Value>().await.unwrap()["id"].as_i64().unwrap();

        for course_id in course_ids {
            let response = self
                .post_json(
                    admin,
                    &format!("/api/admin/groups/{}/courses/{}", group_id, course_id),
                    json!({}),
                )
                .await;
            assert_eq!(response.status().as_u16(), 204);
        }
        group_id
    }

    /// Creates a user with the given role and returns a token for it.
    pub async fn create_user(&self, admin: &str, username: &str, role: &str) -> String {
        let response = self
            .post_json(
                admin,
                "/api/admin/users",
                json!({ "username": username, "password": "secret123", "role": role }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        self.login(username, "secret123").await
    }

    /// Creates a student with a login in `group_id` and returns (student id, token).
    pub async fn create_student(&self, admin: &str, username: &str, group_id: Option<i64>) -> (i64, String) {
        let response = self
            .post_json(
                admin,
                "/api/admin/students",
                json!({
                    "name": username,
                    "email": format!("{}@school.kz", username),
                    "group_id": group_id,
                    "username": username,
                    "password": "secret123"
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let student_id = response.json::<Value>().await.unwrap()["id"].as_i64().unwrap();

        (student_id, self.login(username, "secret123").await)
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}
