// src/handlers/session.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, Transaction};

use crate::{
    config::Config,
    error::AppError,
    models::{
        question::{ServedOption, ServedQuestion},
        session::{
            AnswerFeedback, CompletionSummary, QuizSession, SessionSummary, SubmitAnswerRequest,
        },
    },
    scoring::{self, ScoreInput},
    utils::jwt::Claims,
};

use super::quiz::fetch_eligible_quiz;

const SESSION_COLUMNS: &str = "id, user_id, quiz_id, started_at, ended_at, \
     time_allotted, score, completed, score_aggregated";

async fn fetch_session(
    pool: &PgPool,
    user_id: i64,
    quiz_id: i64,
) -> Result<QuizSession, AppError> {
    sqlx::query_as::<_, QuizSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM quiz_sessions WHERE user_id = $1 AND quiz_id = $2"
    ))
    .bind(user_id)
    .bind(quiz_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Quiz not started".to_string()))
}

async fn load_question(
    pool: &PgPool,
    question_id: i64,
) -> Result<ServedQuestion, AppError> {
    let (id, text, time_allowance) = sqlx::query_as::<_, (i64, String, i32)>(
        "SELECT id, text, time_allowance FROM questions WHERE id = $1",
    )
    .bind(question_id)
    .fetch_one(pool)
    .await?;

    // Correct-option flags stay server-side until the answer comes back.
    let options = sqlx::query_as::<_, ServedOption>(
        "SELECT id, text FROM question_options WHERE question_id = $1 ORDER BY id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(ServedQuestion {
        id,
        text,
        time_allowance,
        options,
    })
}

/// Serves the next question of the caller's session.
///
/// Selection runs over the exact set of questions with no answer slot yet,
/// randomized in SQL; a question is never served into a second slot. When a
/// served question is still awaiting its answer (e.g. the taker paused and
/// resumed), that question is returned again instead of a new one. When
/// nothing remains, the response carries `completed: true` and the summary.
pub async fn next_question(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let quiz = fetch_eligible_quiz(&pool, &slug, user_id).await?;
    let session = fetch_session(&pool, user_id, quiz.id).await?;

    if session.completed {
        let summary = completion_summary_for(&pool, &session).await?;
        return Ok(Json(serde_json::json!({ "completed": true, "summary": summary })));
    }

    // A slot served earlier but never answered takes priority; re-serving it
    // creates no new record.
    let pending = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT question_id FROM session_answers
        WHERE session_id = $1 AND answered_at IS NULL
        ORDER BY created_at
        LIMIT 1
        "#,
    )
    .bind(session.id)
    .fetch_optional(&pool)
    .await?;

    if let Some(question_id) = pending {
        let question = load_question(&pool, question_id).await?;
        return Ok(Json(serde_json::json!({ "completed": false, "question": question })));
    }

    let unserved = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT q.id FROM questions q
        WHERE q.quiz_id = $1
          AND NOT EXISTS (
              SELECT 1 FROM session_answers sa
              WHERE sa.session_id = $2 AND sa.question_id = q.id
          )
        ORDER BY RANDOM()
        LIMIT 1
        "#,
    )
    .bind(quiz.id)
    .bind(session.id)
    .fetch_optional(&pool)
    .await?;

    let Some(question_id) = unserved else {
        // Nothing left to serve: either the quiz has zero questions or every
        // slot is answered. Run the evaluator so zero-question quizzes still
        // complete, then report the summary.
        evaluate_completion(&pool, &config, session.id).await?;
        let session = fetch_session(&pool, user_id, quiz.id).await?;
        let summary = completion_summary_for(&pool, &session).await?;
        return Ok(Json(serde_json::json!({ "completed": session.completed, "summary": summary })));
    };

    // Two racing serves converge on one slot via the unique constraint.
    sqlx::query(
        r#"
        INSERT INTO session_answers (session_id, question_id)
        VALUES ($1, $2)
        ON CONFLICT (session_id, question_id) DO NOTHING
        "#,
    )
    .bind(session.id)
    .bind(question_id)
    .execute(&pool)
    .await?;

    let question = load_question(&pool, question_id).await?;
    Ok(Json(serde_json::json!({ "completed": false, "question": question })))
}

/// Records the caller's choice for a previously served question and returns
/// immediate feedback. Re-submission overwrites the earlier choice; a null
/// option records a skip. Afterwards the completion evaluator runs.
pub async fn submit_answer(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(slug): Path<String>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let quiz = fetch_eligible_quiz(&pool, &slug, user_id).await?;
    let session = fetch_session(&pool, user_id, quiz.id).await?;

    if session.completed {
        return Err(AppError::Conflict("Quiz already completed".to_string()));
    }

    // The slot must have been served; answers out of thin air are rejected.
    let slot_id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM session_answers WHERE session_id = $1 AND question_id = $2",
    )
    .bind(session.id)
    .bind(payload.question_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Question was not served in this session".to_string()))?;

    let correct = match payload.option_id {
        Some(option_id) => sqlx::query_scalar::<_, bool>(
            "SELECT is_correct FROM question_options WHERE id = $1 AND question_id = $2",
        )
        .bind(option_id)
        .bind(payload.question_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| {
            AppError::BadRequest("Option does not belong to this question".to_string())
        })?,
        // Explicit skip.
        None => false,
    };

    sqlx::query("UPDATE session_answers SET option_id = $1, answered_at = NOW() WHERE id = $2")
        .bind(payload.option_id)
        .bind(slot_id)
        .execute(&pool)
        .await?;

    evaluate_completion(&pool, &config, session.id).await?;

    let (answered, total) = progress(&pool, session.id, quiz.id).await?;
    let completed = sqlx::query_scalar::<_, bool>("SELECT completed FROM quiz_sessions WHERE id = $1")
        .bind(session.id)
        .fetch_one(&pool)
        .await?;

    Ok(Json(AnswerFeedback {
        correct,
        answered,
        total_questions: total,
        completed,
    }))
}

async fn progress(pool: &PgPool, session_id: i64, quiz_id: i64) -> Result<(i64, i64), AppError> {
    let answered = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM session_answers WHERE session_id = $1 AND answered_at IS NOT NULL",
    )
    .bind(session_id)
    .fetch_one(pool)
    .await?;

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM questions WHERE quiz_id = $1")
        .bind(quiz_id)
        .fetch_one(pool)
        .await?;

    Ok((answered, total))
}

/// Completion evaluator: when every question has a submitted answer and the
/// session is not yet completed, stamps the end time, computes the score
/// exactly once, and hands off to the aggregator, all in one transaction.
///
/// The row lock makes the `completed` flag an effective once-guard: a second
/// concurrent evaluation waits, re-reads `completed = TRUE` and leaves the
/// score untouched.
pub async fn evaluate_completion(
    pool: &PgPool,
    config: &Config,
    session_id: i64,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let session = sqlx::query_as::<_, QuizSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM quiz_sessions WHERE id = $1 FOR UPDATE"
    ))
    .bind(session_id)
    .fetch_one(&mut *tx)
    .await?;

    if session.completed {
        tx.commit().await?;
        return Ok(());
    }

    let answered = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM session_answers WHERE session_id = $1 AND answered_at IS NOT NULL",
    )
    .bind(session_id)
    .fetch_one(&mut *tx)
    .await?;

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM questions WHERE quiz_id = $1")
        .bind(session.quiz_id)
        .fetch_one(&mut *tx)
        .await?;

    if answered != total {
        tx.commit().await?;
        return Ok(());
    }

    let correct_count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM session_answers sa
        JOIN question_options o ON o.id = sa.option_id
        WHERE sa.session_id = $1 AND o.is_correct
        "#,
    )
    .bind(session_id)
    .fetch_one(&mut *tx)
    .await?;

    let ended_at = chrono::Utc::now();
    let elapsed_secs = (ended_at - session.started_at).num_seconds();

    let score = scoring::completion_score(
        ScoreInput {
            elapsed_secs,
            question_count: total,
            correct_count,
            time_allotted_secs: session.time_allotted,
        },
        config.overhead_secs_per_question,
        config.score_base,
    );

    sqlx::query(
        r#"
        UPDATE quiz_sessions
        SET ended_at = $1, score = $2, completed = TRUE, updated_at = NOW()
        WHERE id = $3
        "#,
    )
    .bind(ended_at)
    .bind(score)
    .bind(session_id)
    .execute(&mut *tx)
    .await?;

    aggregate_user_score(&mut tx, session.user_id, session_id).await?;

    tx.commit().await?;

    tracing::info!(
        session_id,
        user_id = session.user_id,
        score,
        correct_count,
        elapsed_secs,
        "session completed"
    );

    Ok(())
}

/// Score aggregator: full recompute of the user's standing total inside the
/// completion transaction, never an incremental add. The standing total is
/// the sum of completed session scores minus redeemed costs, floored at zero
/// to satisfy the storage constraint.
async fn aggregate_user_score(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    session_id: i64,
) -> Result<(), AppError> {
    // Lock the user's score row before reading the sums. A concurrent
    // redemption by the same user either committed already (its debit is
    // visible below) or is queued behind this lock; reading the redemption
    // sum first would let a debit commit in between and be overwritten.
    sqlx::query("INSERT INTO user_scores (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    sqlx::query("SELECT total_score FROM user_scores WHERE user_id = $1 FOR UPDATE")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    let earned = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(score), 0)::BIGINT FROM quiz_sessions
         WHERE user_id = $1 AND completed = TRUE",
    )
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;

    let redeemed = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COALESCE(SUM(r.cost), 0)::BIGINT
        FROM reward_redemptions rr
        JOIN rewards r ON r.id = rr.reward_id
        WHERE rr.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;

    let total = (earned - redeemed).max(0);

    sqlx::query("UPDATE user_scores SET total_score = $2, updated_at = NOW() WHERE user_id = $1")
        .bind(user_id)
        .bind(total)
        .execute(&mut **tx)
        .await?;

    sqlx::query("UPDATE quiz_sessions SET score_aggregated = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(session_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

async fn completion_summary_for(
    pool: &PgPool,
    session: &QuizSession,
) -> Result<CompletionSummary, AppError> {
    let (_, total) = progress(pool, session.id, session.quiz_id).await?;

    let correct_count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM session_answers sa
        JOIN question_options o ON o.id = sa.option_id
        WHERE sa.session_id = $1 AND o.is_correct
        "#,
    )
    .bind(session.id)
    .fetch_one(pool)
    .await?;

    let elapsed_secs = session
        .ended_at
        .map(|end| (end - session.started_at).num_seconds())
        .unwrap_or(0);

    Ok(CompletionSummary {
        completed: session.completed,
        score: session.score,
        correct_count,
        total_questions: total,
        elapsed_secs,
        time_allotted: session.time_allotted,
    })
}

/// Completion page data. Before completion this reports progress so the
/// client can route back to the question flow.
pub async fn quiz_complete(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let quiz = fetch_eligible_quiz(&pool, &slug, user_id).await?;
    let session = fetch_session(&pool, user_id, quiz.id).await?;

    let summary = completion_summary_for(&pool, &session).await?;
    Ok(Json(summary))
}

/// Lists the caller's sessions across quizzes, in-progress and finished.
pub async fn my_sessions(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let sessions = sqlx::query_as::<_, SessionSummary>(
        r#"
        SELECT q.title AS quiz_title,
               q.slug AS quiz_slug,
               (SELECT COUNT(*) FROM session_answers sa
                WHERE sa.session_id = s.id AND sa.answered_at IS NOT NULL) AS answered,
               (SELECT COUNT(*) FROM questions qs
                WHERE qs.quiz_id = q.id) AS total_questions,
               s.completed,
               s.score,
               s.started_at,
               s.ended_at
        FROM quiz_sessions s
        JOIN quizzes q ON q.id = s.quiz_id
        WHERE s.user_id = $1
        ORDER BY s.started_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(sessions))
}
