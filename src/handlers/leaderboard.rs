// src/handlers/leaderboard.rs

use axum::{Json, extract::State, response::IntoResponse};
use sqlx::PgPool;

use crate::{config::LEADERBOARD_SIZE, error::AppError, models::score::LeaderboardEntry};

/// Retrieves the top standing scores, highest first.
pub async fn get_leaderboard(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let leaderboard = sqlx::query_as::<_, LeaderboardEntry>(
        r#"
        SELECT u.username, s.total_score
        FROM user_scores s
        JOIN users u ON u.id = s.user_id
        ORDER BY s.total_score DESC, u.username ASC
        LIMIT $1
        "#,
    )
    .bind(LEADERBOARD_SIZE)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch leaderboard: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(leaderboard))
}
