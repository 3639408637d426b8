// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub level_id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub published: bool,
    /// Set when `published` flips to true, cleared when it flips back.
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Quizzes past this date stop being eligible; NULL means open-ended.
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Listing row for eligible quizzes, with aggregate question info joined in.
#[derive(Debug, Serialize, FromRow)]
pub struct QuizSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    pub question_count: i64,
    /// Sum of question time allowances in seconds.
    pub total_time: i64,
}

/// Detail projection, including whether the caller already has a session.
#[derive(Debug, Serialize)]
pub struct QuizDetail {
    #[serde(flatten)]
    pub summary: QuizSummary,
    pub started: bool,
    pub completed: bool,
}

/// DTO for creating a quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    pub level_id: i64,
    #[validate(length(min = 1, max = 70))]
    pub title: String,
    /// Derived from `title` when omitted.
    pub slug: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub published: bool,
}

/// DTO for updating a quiz. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateQuizRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Absent leaves the deadline unchanged; an explicit `null` clears it.
    #[serde(default, deserialize_with = "deserialize_some")]
    pub end_date: Option<Option<chrono::DateTime<chrono::Utc>>>,
    pub published: Option<bool>,
}

/// Wraps a present field in `Some`, so a JSON `null` arrives as `Some(None)`
/// while an absent field stays `None` via `#[serde(default)]`.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}
