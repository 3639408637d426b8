// src/config.rs

use std::env;

use dotenvy::dotenv;

/// Fixed per-question handling cost (seconds) subtracted from elapsed time
/// before the time ratio is computed. Empirical constant; overridable via
/// SCORE_OVERHEAD_SECS for tuning.
pub const DEFAULT_OVERHEAD_SECS_PER_QUESTION: i64 = 2;

/// Base multiplier applied per correct answer when a session completes.
pub const DEFAULT_SCORE_BASE: i64 = 100;

/// Number of rows returned by the leaderboard endpoint.
pub const LEADERBOARD_SIZE: i64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub overhead_secs_per_question: i64,
    pub score_base: i64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let admin_username = env::var("ADMIN_USERNAME").ok();
        let admin_password = env::var("ADMIN_PASSWORD").ok();

        let overhead_secs_per_question = env::var("SCORE_OVERHEAD_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_OVERHEAD_SECS_PER_QUESTION);

        let score_base = env::var("SCORE_BASE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SCORE_BASE);

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_username,
            admin_password,
            overhead_secs_per_question,
            score_base,
        }
    }
}
