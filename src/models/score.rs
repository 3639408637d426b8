// src/models/score.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'user_scores' table: one row per user, created lazily and
/// recomputed in place whenever one of their sessions newly completes.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserScore {
    pub id: i64,
    pub user_id: i64,
    pub total_score: i64,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Leaderboard row joined from `users` and `user_scores`.
#[derive(Debug, Serialize, FromRow)]
pub struct LeaderboardEntry {
    pub username: String,
    pub total_score: i64,
}
