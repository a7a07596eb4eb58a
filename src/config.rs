// src/config.rs

use std::env;
use std::time::Duration;

use dotenvy::dotenv;

/// Length of one countdown unit for live quiz attempts.
pub const QUIZ_TICK: Duration = Duration::from_secs(1);

/// Upper bound accepted for `quizzes.time_limit_minutes`.
pub const MAX_TIME_LIMIT_MINUTES: i32 = 600;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    /// Directory receipts are written to. The stored reference is relative to it.
    pub receipt_dir: String,
    pub max_receipt_bytes: usize,
    pub quiz_tick: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let receipt_dir =
            env::var("RECEIPT_DIR").unwrap_or_else(|_| "uploads/receipts".to_string());

        let max_receipt_bytes = env::var("MAX_RECEIPT_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5 * 1024 * 1024);

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            receipt_dir,
            max_receipt_bytes,
            quiz_tick: QUIZ_TICK,
        }
    }
}
