// src/models/reward.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'rewards' table: redeemable catalog entries with finite
/// stock.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Reward {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub cost: i64,
    pub stock: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Catalog projection with a per-caller affordability flag.
#[derive(Debug, Serialize, FromRow)]
pub struct RewardListing {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub cost: i64,
    pub stock: i64,
    pub affordable: bool,
}

/// One row of a user's redemption history.
#[derive(Debug, Serialize, FromRow)]
pub struct RedemptionEntry {
    pub reward_name: String,
    pub cost: i64,
    pub redeemed_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a reward.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRewardRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub cost: i64,
    #[validate(range(min = 0))]
    pub stock: i64,
}

/// DTO for updating a reward. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateRewardRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub cost: Option<i64>,
    pub stock: Option<i64>,
}
