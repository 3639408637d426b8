// src/models/session.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'quiz_sessions' table: one user's single attempt at one
/// quiz, unique per (user, quiz).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizSession {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Sum of the quiz's question time allowances, captured at creation.
    pub time_allotted: i64,
    /// Zero until completion; written exactly once.
    pub score: i64,
    pub completed: bool,
    pub score_aggregated: bool,
}

/// Represents the 'session_answers' table: the per-question slot created
/// when a question is served, filled in when the taker submits.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SessionAnswer {
    pub id: i64,
    pub session_id: i64,
    pub question_id: i64,
    pub option_id: Option<i64>,
    pub answered_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Listing row for a user's sessions, with quiz info and progress joined in.
#[derive(Debug, Serialize, FromRow)]
pub struct SessionSummary {
    pub quiz_title: String,
    pub quiz_slug: String,
    pub answered: i64,
    pub total_questions: i64,
    pub completed: bool,
    pub score: i64,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for submitting an answer. A null `option_id` records a skip.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_id: i64,
    pub option_id: Option<i64>,
}

/// Immediate feedback returned after each submission.
#[derive(Debug, Serialize)]
pub struct AnswerFeedback {
    pub correct: bool,
    pub answered: i64,
    pub total_questions: i64,
    pub completed: bool,
}

/// Completion summary for a finished session.
#[derive(Debug, Serialize)]
pub struct CompletionSummary {
    pub completed: bool,
    pub score: i64,
    pub correct_count: i64,
    pub total_questions: i64,
    pub elapsed_secs: i64,
    pub time_allotted: i64,
}
