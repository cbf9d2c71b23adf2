// src/config.rs

use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;

/// File extensions accepted for homework uploads (documents and images).
pub const ALLOWED_HOMEWORK_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "ppt", "pptx", "xls", "xlsx", "txt", "zip", "png", "jpg", "jpeg", "gif",
];

/// Largest accepted multipart body for homework uploads.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Session key under which the in-progress attempt of a quiz is remembered.
pub fn attempt_session_key(quiz_id: i64) -> String {
    format!("attempt_test_{}", quiz_id)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub upload_dir: PathBuf,
    pub bind_addr: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://lms.db?mode=rwc".to_string());

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            upload_dir,
            bind_addr,
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
        }
    }

    /// Directory holding files attached to homework submissions.
    pub fn homework_dir(&self) -> PathBuf {
        self.upload_dir.join("homework")
    }
}
