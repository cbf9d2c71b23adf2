use std::sync::Arc;

use axum::extract::FromRef;
use chrono::Duration;
use sqlx::SqlitePool;

use crate::{
    catalog::Catalog,
    clock::{Clock, SystemClock},
    config::Config,
    services::session::{SessionStore, SqlSessionStore},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub catalog: Arc<Catalog>,
    pub clock: Arc<dyn Clock>,
    pub sessions: Arc<dyn SessionStore>,
}

impl AppState {
    /// Production wiring: wall clock and database-backed sessions.
    pub fn new(pool: SqlitePool, config: Config, catalog: Catalog) -> Self {
        Self::with_clock(pool, config, catalog, Arc::new(SystemClock))
    }

    pub fn with_clock(
        pool: SqlitePool,
        config: Config,
        catalog: Catalog,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let session_ttl = Duration::seconds(config.jwt_expiration as i64);
        let sessions = Arc::new(SqlSessionStore::new(pool.clone(), clock.clone(), session_ttl));
        Self {
            pool,
            config,
            catalog: Arc::new(catalog),
            clock,
            sessions,
        }
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
