// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        level::Level,
        quiz::{Quiz, QuizDetail, QuizSummary},
    },
    utils::jwt::Claims,
};

/// Eligibility predicate shared by browsing and session routes: the quiz
/// must be published, not past its end date, and must list the user as an
/// authorized taker.
const ELIGIBLE: &str = "q.published = TRUE
        AND (q.end_date IS NULL OR q.end_date >= NOW())
        AND EXISTS (
            SELECT 1 FROM quiz_users qu
            WHERE qu.quiz_id = q.id AND qu.user_id = $1
        )";

/// Looks up a quiz by slug and checks the caller's eligibility.
///
/// 404 when the slug is unknown, 403 when the quiz exists but the caller
/// may not take it (unpublished, expired, or not on the roster).
pub async fn fetch_eligible_quiz(
    pool: &PgPool,
    slug: &str,
    user_id: i64,
) -> Result<Quiz, AppError> {
    let quiz = sqlx::query_as::<_, Quiz>(
        r#"
        SELECT id, level_id, title, slug, description, published,
               published_at, end_date, created_at
        FROM quizzes
        WHERE slug = $1
        "#,
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    let eligible = sqlx::query_scalar::<_, bool>(&format!(
        "SELECT EXISTS (SELECT 1 FROM quizzes q WHERE q.id = $2 AND {ELIGIBLE})"
    ))
    .bind(user_id)
    .bind(quiz.id)
    .fetch_one(pool)
    .await?;

    if !eligible {
        return Err(AppError::Forbidden(
            "You are not eligible for this quiz".to_string(),
        ));
    }

    Ok(quiz)
}

/// Lists the levels the caller belongs to.
pub async fn list_levels(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let levels = sqlx::query_as::<_, Level>(
        r#"
        SELECT l.id, l.name, l.slug, l.description, l.created_at
        FROM levels l
        JOIN level_users lu ON lu.level_id = l.id
        WHERE lu.user_id = $1
        ORDER BY l.name
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(levels))
}

/// Lists the caller's eligible quizzes within one level, soonest deadline
/// first.
pub async fn level_quizzes(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let level_id = sqlx::query_scalar::<_, i64>("SELECT id FROM levels WHERE slug = $1")
        .bind(&slug)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Level not found".to_string()))?;

    let quizzes = sqlx::query_as::<_, QuizSummary>(&format!(
        r#"
        SELECT q.id, q.title, q.slug, q.description, q.end_date,
               COUNT(qs.id) AS question_count,
               COALESCE(SUM(qs.time_allowance), 0)::BIGINT AS total_time
        FROM quizzes q
        LEFT JOIN questions qs ON qs.quiz_id = q.id
        WHERE q.level_id = $2 AND {ELIGIBLE}
        GROUP BY q.id
        ORDER BY q.end_date ASC NULLS LAST
        "#
    ))
    .bind(user_id)
    .bind(level_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(quizzes))
}

/// Lists every quiz the caller can currently take, soonest deadline first.
pub async fn list_quizzes(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let quizzes = sqlx::query_as::<_, QuizSummary>(&format!(
        r#"
        SELECT q.id, q.title, q.slug, q.description, q.end_date,
               COUNT(qs.id) AS question_count,
               COALESCE(SUM(qs.time_allowance), 0)::BIGINT AS total_time
        FROM quizzes q
        LEFT JOIN questions qs ON qs.quiz_id = q.id
        WHERE {ELIGIBLE}
        GROUP BY q.id
        ORDER BY q.end_date ASC NULLS LAST
        "#
    ))
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(quizzes))
}

/// Quiz detail plus whether the caller already has a session for it.
pub async fn quiz_detail(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let quiz = fetch_eligible_quiz(&pool, &slug, user_id).await?;

    let summary = sqlx::query_as::<_, QuizSummary>(
        r#"
        SELECT q.id, q.title, q.slug, q.description, q.end_date,
               COUNT(qs.id) AS question_count,
               COALESCE(SUM(qs.time_allowance), 0)::BIGINT AS total_time
        FROM quizzes q
        LEFT JOIN questions qs ON qs.quiz_id = q.id
        WHERE q.id = $1
        GROUP BY q.id
        "#,
    )
    .bind(quiz.id)
    .fetch_one(&pool)
    .await?;

    let session = sqlx::query_as::<_, (bool,)>(
        "SELECT completed FROM quiz_sessions WHERE user_id = $1 AND quiz_id = $2",
    )
    .bind(user_id)
    .bind(quiz.id)
    .fetch_optional(&pool)
    .await?;

    Ok(Json(QuizDetail {
        summary,
        started: session.is_some(),
        completed: session.map(|s| s.0).unwrap_or(false),
    }))
}

/// Starts a session: one attempt per (user, quiz), enforced by the unique
/// constraint so two racing starts cannot both succeed.
///
/// The total allotted time is captured here; later edits to the quiz's
/// questions do not retroactively change a running session's budget.
pub async fn start_session(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let quiz = fetch_eligible_quiz(&pool, &slug, user_id).await?;

    let time_allotted = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(time_allowance), 0)::BIGINT FROM questions WHERE quiz_id = $1",
    )
    .bind(quiz.id)
    .fetch_one(&pool)
    .await?;

    let session_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO quiz_sessions (user_id, quiz_id, time_allotted)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, quiz_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(quiz.id)
    .bind(time_allotted)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::Conflict("Quiz already started".to_string()))?;

    tracing::info!(user_id, quiz_id = quiz.id, session_id, "session started");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "session_id": session_id,
            "time_allotted": time_allotted
        })),
    ))
}
