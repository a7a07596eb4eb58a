// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{config::Config, services::attempts::QuizAttempts, store::Store};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    /// Workflow storage; Postgres in production, in-memory in tests.
    pub store: Arc<dyn Store>,
    pub attempts: Arc<QuizAttempts>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config, store: Arc<dyn Store>) -> Self {
        let attempts = Arc::new(QuizAttempts::new(store.clone(), config.quiz_tick));
        AppState {
            pool,
            config,
            store,
            attempts,
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn Store> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Arc<QuizAttempts> {
    fn from_ref(state: &AppState) -> Self {
        state.attempts.clone()
    }
}
