// src/models/level.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'levels' table. A level groups quizzes and carries its own
/// authorized-user list.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Level {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a level.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLevelRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Derived from `name` when omitted.
    pub slug: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

/// DTO for updating a level. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateLevelRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// DTO for replacing the authorized-user set of a level or quiz.
#[derive(Debug, Deserialize)]
pub struct AssignUsersRequest {
    pub user_ids: Vec<i64>,
}
