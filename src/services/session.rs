// src/services/session.rs

//! Server-side session scope.
//!
//! Each login mints a session id (carried in the JWT `sid` claim). Request
//! handlers pass a [`SessionContext`] explicitly to the services that need to
//! remember something between requests, such as the in-progress attempt of a quiz.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use sqlx::SqlitePool;

use crate::{clock::Clock, config::attempt_session_key, error::AppError, utils::jwt::Claims};

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>, AppError>;
    async fn set(&self, session_id: &str, key: &str, value: &str) -> Result<(), AppError>;
    async fn remove(&self, session_id: &str, key: &str) -> Result<(), AppError>;
}

/// Session values persisted in the `session_values` table.
///
/// Values untouched for longer than `ttl` belong to sessions whose token has
/// expired and are dropped on the next write.
#[derive(Clone)]
pub struct SqlSessionStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SqlSessionStore {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { pool, clock, ttl }
    }

    /// Deletes values last written before `now - ttl`.
    pub async fn prune_expired(&self) -> Result<u64, AppError> {
        let cutoff = self.clock.now() - self.ttl;
        let result = sqlx::query("DELETE FROM session_values WHERE updated_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            tracing::info!("Pruned {} expired session values", result.rows_affected());
        }
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionStore for SqlSessionStore {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>, AppError> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT value FROM session_values WHERE session_id = ? AND key = ?",
        )
        .bind(session_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn set(&self, session_id: &str, key: &str, value: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO session_values (session_id, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(session_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(session_id)
        .bind(key)
        .bind(value)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to write session value: {:?}", e);
            AppError::from(e)
        })?;

        self.prune_expired().await?;
        Ok(())
    }

    async fn remove(&self, session_id: &str, key: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM session_values WHERE session_id = ? AND key = ?")
            .bind(session_id)
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Process-local store, used where no database is wanted.
#[derive(Default)]
pub struct MemorySessionStore {
    values: Mutex<HashMap<(String, String), String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<(String, String), String>>, AppError> {
        self.values
            .lock()
            .map_err(|_| AppError::InternalServerError("Session store lock poisoned".to_string()))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>, AppError> {
        Ok(self
            .lock()?
            .get(&(session_id.to_string(), key.to_string()))
            .cloned())
    }

    async fn set(&self, session_id: &str, key: &str, value: &str) -> Result<(), AppError> {
        self.lock()?
            .insert((session_id.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    async fn remove(&self, session_id: &str, key: &str) -> Result<(), AppError> {
        self.lock()?
            .remove(&(session_id.to_string(), key.to_string()));
        Ok(())
    }
}

/// The session a request belongs to, plus typed accessors for the values kept in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: String,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }

    pub fn from_claims(claims: &Claims) -> Self {
        Self::new(claims.sid.clone())
    }

    /// Attempt id bound to `quiz_id`, if any. An unparsable value counts as unbound.
    pub async fn attempt_id(
        &self,
        store: &dyn SessionStore,
        quiz_id: i64,
    ) -> Result<Option<i64>, AppError> {
        let raw = store
            .get(&self.session_id, &attempt_session_key(quiz_id))
            .await?;

        Ok(raw.and_then(|value| match value.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!("Discarding malformed attempt binding '{}'", value);
                None
            }
        }))
    }

    pub async fn bind_attempt(
        &self,
        store: &dyn SessionStore,
        quiz_id: i64,
        attempt_id: i64,
    ) -> Result<(), AppError> {
        store
            .set(
                &self.session_id,
                &attempt_session_key(quiz_id),
                &attempt_id.to_string(),
            )
            .await
    }

    pub async fn unbind_attempt(&self, store: &dyn SessionStore, quiz_id: i64) -> Result<(), AppError> {
        store
            .remove(&self.session_id, &attempt_session_key(quiz_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, SystemClock};
    use crate::db;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn memory_store_binds_attempts_per_session() {
        let store = MemorySessionStore::new();
        let a = SessionContext::new("a");
        let b = SessionContext::new("b");

        a.bind_attempt(&store, 5, 42).await.unwrap();

        assert_eq!(a.attempt_id(&store, 5).await.unwrap(), Some(42));
        assert_eq!(a.attempt_id(&store, 6).await.unwrap(), None);
        assert_eq!(b.attempt_id(&store, 5).await.unwrap(), None);

        a.unbind_attempt(&store, 5).await.unwrap();
        assert_eq!(a.attempt_id(&store, 5).await.unwrap(), None);
    }

    #[tokio::test]
    async fn sql_store_overwrites_and_removes() {
        let pool = db::test_pool().await;
        let store = SqlSessionStore::new(pool, Arc::new(SystemClock), Duration::hours(1));

        store.set("s1", "attempt_test_1", "10").await.unwrap();
        store.set("s1", "attempt_test_1", "11").await.unwrap();
        assert_eq!(
            store.get("s1", "attempt_test_1").await.unwrap().as_deref(),
            Some("11")
        );

        store.remove("s1", "attempt_test_1").await.unwrap();
        assert_eq!(store.get("s1", "attempt_test_1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn values_of_expired_sessions_are_pruned_on_write() {
        let pool = db::test_pool().await;
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 9, 1, 9, 0, 0).unwrap()));
        let store = SqlSessionStore::new(pool.clone(), clock.clone(), Duration::hours(24));

        store.set("old", "attempt_test_1", "10").await.unwrap();
        clock.advance(Duration::hours(23));
        store.set("recent", "attempt_test_1", "11").await.unwrap();
        assert_eq!(store.get("old", "attempt_test_1").await.unwrap().as_deref(), Some("10"));

        clock.advance(Duration::hours(2));
        store.set("fresh", "attempt_test_2", "12").await.unwrap();

        assert_eq!(store.get("old", "attempt_test_1").await.unwrap(), None);
        assert_eq!(store.get("recent", "attempt_test_1").await.unwrap().as_deref(), Some("11"));
        assert_eq!(store.prune_expired().await.unwrap(), 0);
        let remaining = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM session_values")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 2);
    }

    #[tokio::test]
    async fn malformed_binding_is_ignored() {
        let store = MemorySessionStore::new();
        store.set("s", "attempt_test_9", "not-a-number").await.unwrap();
        let ctx = SessionContext::new("s");
        assert_eq!(ctx.attempt_id(&store, 9).await.unwrap(), None);
    }
}
