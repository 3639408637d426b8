// src/handlers/reward.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::reward::{RedemptionEntry, RewardListing},
    utils::jwt::Claims,
};

/// Reward catalog with a per-caller affordability flag.
pub async fn list_rewards(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let rewards = sqlx::query_as::<_, RewardListing>(
        r#"
        SELECT r.id, r.name, r.description, r.cost, r.stock,
               COALESCE(s.total_score, 0) >= r.cost AS affordable
        FROM rewards r
        LEFT JOIN user_scores s ON s.user_id = $1
        ORDER BY r.cost ASC, r.name ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(rewards))
}

/// Redeems a reward for the caller.
///
/// Stock decrement, score debit and ledger insert are one transaction with
/// conditional UPDATEs, so two concurrent redemptions of the last unit
/// cannot both succeed and nothing commits partially.
pub async fn redeem(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(reward_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let mut tx = pool.begin().await?;

    let cost = sqlx::query_scalar::<_, i64>("SELECT cost FROM rewards WHERE id = $1")
        .bind(reward_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Reward not found".to_string()))?;

    // Decrement-if-positive; zero rows means the stock ran out first.
    let stock_rows = sqlx::query(
        "UPDATE rewards SET stock = stock - 1, updated_at = NOW()
         WHERE id = $1 AND stock > 0",
    )
    .bind(reward_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if stock_rows == 0 {
        return Err(AppError::Conflict("Reward is out of stock".to_string()));
    }

    // The score row may not exist yet for users who never completed a quiz.
    sqlx::query("INSERT INTO user_scores (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let debit_rows = sqlx::query(
        "UPDATE user_scores SET total_score = total_score - $1, updated_at = NOW()
         WHERE user_id = $2 AND total_score >= $1",
    )
    .bind(cost)
    .bind(user_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if debit_rows == 0 {
        // Dropping the transaction rolls the stock decrement back.
        return Err(AppError::Conflict(
            "Insufficient score for this reward".to_string(),
        ));
    }

    sqlx::query("INSERT INTO reward_redemptions (user_id, reward_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(reward_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id, reward_id, cost, "reward redeemed");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "reward_id": reward_id, "cost": cost })),
    ))
}

/// The caller's redemption history, newest first.
pub async fn redemption_history(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let history = sqlx::query_as::<_, RedemptionEntry>(
        r#"
        SELECT r.name AS reward_name, r.cost, rr.redeemed_at
        FROM reward_redemptions rr
        JOIN rewards r ON r.id = rr.reward_id
        WHERE rr.user_id = $1
        ORDER BY rr.redeemed_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(history))
}
