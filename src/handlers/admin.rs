// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        level::{AssignUsersRequest, CreateLevelRequest, UpdateLevelRequest},
        question::{CreateQuestionRequest, NewOption, UpdateQuestionRequest, validate_options},
        quiz::{CreateQuizRequest, UpdateQuizRequest},
        reward::{CreateRewardRequest, UpdateRewardRequest},
        user::User,
    },
    utils::{hash::hash_password, html::clean_html, jwt::Claims, slug::slugify},
};

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(
        "SELECT id, username, password, role, created_at FROM users ORDER BY id DESC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(users))
}

/// DTO for Admin creating a user (can specify role).
#[derive(Debug, Deserialize, Validate)]
pub struct AdminCreateUserRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(length(min = 4, max = 128))]
    pub password: String,
    pub role: String, // 'user' or 'admin'
}

/// Creates a new user with a specific role.
/// Admin only.
pub async fn create_user(
    State(pool): State<PgPool>,
    Json(payload): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    if payload.role != "user" && payload.role != "admin" {
        return Err(AppError::BadRequest("Role must be 'user' or 'admin'".to_string()));
    }

    let hashed_password = hash_password(&payload.password)?;

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (username, password, role) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&payload.username)
    .bind(&hashed_password)
    .bind(&payload.role)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
            AppError::Conflict(format!("Username '{}' already exists", payload.username))
        } else {
            tracing::error!("Failed to create user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    sqlx::query("INSERT INTO user_scores (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// DTO for updating a user. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub username: Option<String>,
    pub role: Option<String>,
    pub password: Option<String>,
}

/// Updates user information.
/// Admin only.
pub async fn update_user(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_exists(&pool, "users", id, "User not found").await?;

    if let Some(new_username) = payload.username {
        sqlx::query("UPDATE users SET username = $1 WHERE id = $2")
            .bind(new_username)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(new_role) = payload.role {
        if new_role != "user" && new_role != "admin" {
            return Err(AppError::BadRequest("Role must be 'user' or 'admin'".to_string()));
        }
        sqlx::query("UPDATE users SET role = $1 WHERE id = $2")
            .bind(new_role)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(new_password) = payload.password {
        let hashed = hash_password(&new_password)?;
        sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
            .bind(hashed)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    Ok(StatusCode::OK)
}

/// Deletes a user by ID.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if id == claims.user_id()? {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Levels
// ---------------------------------------------------------------------------

/// Creates a level. The slug is derived from the name when omitted.
pub async fn create_level(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateLevelRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let slug = payload.slug.unwrap_or_else(|| slugify(&payload.name));
    if slug.is_empty() {
        return Err(AppError::BadRequest("Slug cannot be empty".to_string()));
    }
    let description = clean_html(payload.description.as_deref().unwrap_or(""));

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO levels (name, slug, description) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&payload.name)
    .bind(&slug)
    .bind(&description)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
            AppError::Conflict("Level name or slug already exists".to_string())
        } else {
            AppError::from(e)
        }
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id, "slug": slug }))))
}

/// Updates a level's name or description.
pub async fn update_level(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateLevelRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_exists(&pool, "levels", id, "Level not found").await?;

    if let Some(name) = payload.name {
        sqlx::query("UPDATE levels SET name = $1, updated_at = NOW() WHERE id = $2")
            .bind(name)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(description) = payload.description {
        sqlx::query("UPDATE levels SET description = $1, updated_at = NOW() WHERE id = $2")
            .bind(clean_html(&description))
            .bind(id)
            .execute(&pool)
            .await?;
    }

    Ok(StatusCode::OK)
}

/// Deletes a level and, via cascade, its quizzes.
pub async fn delete_level(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM levels WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Level not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Replaces the authorized-user set of a level.
pub async fn assign_level_users(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<AssignUsersRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_exists(&pool, "levels", id, "Level not found").await?;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM level_users WHERE level_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    for user_id in &payload.user_ids {
        sqlx::query(
            "INSERT INTO level_users (level_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(StatusCode::OK)
}

// ---------------------------------------------------------------------------
// Quizzes
// ---------------------------------------------------------------------------

/// Creates a quiz under a level.
///
/// A non-null end date must lie in the future at validation time. When the
/// quiz is created already published, `published_at` is stamped.
pub async fn create_quiz(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    ensure_exists(&pool, "levels", payload.level_id, "Level not found").await?;

    if let Some(end_date) = payload.end_date {
        if end_date < chrono::Utc::now() {
            return Err(AppError::BadRequest("End date must be in the future".to_string()));
        }
    }

    let slug = payload.slug.unwrap_or_else(|| slugify(&payload.title));
    if slug.is_empty() {
        return Err(AppError::BadRequest("Slug cannot be empty".to_string()));
    }
    let description = clean_html(payload.description.as_deref().unwrap_or(""));

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO quizzes (level_id, title, slug, description, end_date, published, published_at)
        VALUES ($1, $2, $3, $4, $5, $6, CASE WHEN $6 THEN NOW() END)
        RETURNING id
        "#,
    )
    .bind(payload.level_id)
    .bind(&payload.title)
    .bind(&slug)
    .bind(&description)
    .bind(payload.end_date)
    .bind(payload.published)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
            AppError::Conflict(format!("Quiz slug '{}' already exists", slug))
        } else {
            AppError::from(e)
        }
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id, "slug": slug }))))
}

/// Updates a quiz. Flipping `published` sets or clears `published_at`.
pub async fn update_quiz(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_exists(&pool, "quizzes", id, "Quiz not found").await?;

    if let Some(title) = payload.title {
        sqlx::query("UPDATE quizzes SET title = $1, updated_at = NOW() WHERE id = $2")
            .bind(title)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(description) = payload.description {
        sqlx::query("UPDATE quizzes SET description = $1, updated_at = NOW() WHERE id = $2")
            .bind(clean_html(&description))
            .bind(id)
            .execute(&pool)
            .await?;
    }

    // An explicit null clears the deadline; an absent field leaves it alone.
    if let Some(end_date) = payload.end_date {
        if let Some(date) = end_date {
            if date < chrono::Utc::now() {
                return Err(AppError::BadRequest("End date must be in the future".to_string()));
            }
        }
        sqlx::query("UPDATE quizzes SET end_date = $1, updated_at = NOW() WHERE id = $2")
            .bind(end_date)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(published) = payload.published {
        sqlx::query(
            r#"
            UPDATE quizzes
            SET published = $1,
                published_at = CASE WHEN $1 THEN NOW() END,
                updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(published)
        .bind(id)
        .execute(&pool)
        .await?;
    }

    Ok(StatusCode::OK)
}

/// Deletes a quiz and, via cascade, its questions and sessions.
pub async fn delete_quiz(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Replaces the authorized-taker set of a quiz.
pub async fn assign_quiz_users(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<AssignUsersRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_exists(&pool, "quizzes", id, "Quiz not found").await?;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM quiz_users WHERE quiz_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    for user_id in &payload.user_ids {
        sqlx::query(
            "INSERT INTO quiz_users (quiz_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(StatusCode::OK)
}

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

async fn insert_options(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    question_id: i64,
    options: &[NewOption],
) -> Result<(), AppError> {
    for opt in options {
        sqlx::query(
            "INSERT INTO question_options (question_id, text, is_correct) VALUES ($1, $2, $3)",
        )
        .bind(question_id)
        .bind(&opt.text)
        .bind(opt.is_correct)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Creates a question with its options in one transaction.
///
/// The 3-to-6-options and exactly-one-correct rules are authoring-time
/// checks carried by the request validator.
pub async fn create_question(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    ensure_exists(&pool, "quizzes", payload.quiz_id, "Quiz not found").await?;

    let time_allowance = payload.time_allowance.unwrap_or(60);
    if time_allowance <= 0 {
        return Err(AppError::BadRequest("Time allowance must be positive".to_string()));
    }

    let mut tx = pool.begin().await?;

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO questions (quiz_id, text, time_allowance) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(payload.quiz_id)
    .bind(&payload.text)
    .bind(time_allowance)
    .fetch_one(&mut *tx)
    .await?;

    insert_options(&mut tx, id, &payload.options).await?;

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Updates a question. When `options` is present the option set is replaced
/// wholesale, under the same authoring rules as creation.
pub async fn update_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    ensure_exists(&pool, "questions", id, "Question not found").await?;

    if let Some(text) = &payload.text {
        sqlx::query("UPDATE questions SET text = $1, updated_at = NOW() WHERE id = $2")
            .bind(text)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(time_allowance) = payload.time_allowance {
        if time_allowance <= 0 {
            return Err(AppError::BadRequest("Time allowance must be positive".to_string()));
        }
        sqlx::query("UPDATE questions SET time_allowance = $1, updated_at = NOW() WHERE id = $2")
            .bind(time_allowance)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(options) = &payload.options {
        validate_options(options).map_err(|e| AppError::BadRequest(e.to_string()))?;

        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM question_options WHERE question_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_options(&mut tx, id, options).await?;
        tx.commit().await?;
    }

    Ok(StatusCode::OK)
}

/// Deletes a question and, via cascade, its options and answer slots.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Rewards
// ---------------------------------------------------------------------------

/// Creates a reward catalog entry.
pub async fn create_reward(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateRewardRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let description = clean_html(payload.description.as_deref().unwrap_or(""));

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO rewards (name, description, cost, stock) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(&payload.name)
    .bind(&description)
    .bind(payload.cost)
    .bind(payload.stock)
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Updates a reward. Cost and stock must stay non-negative; the CHECK
/// constraints back this up.
pub async fn update_reward(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateRewardRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_exists(&pool, "rewards", id, "Reward not found").await?;

    if let Some(name) = payload.name {
        sqlx::query("UPDATE rewards SET name = $1, updated_at = NOW() WHERE id = $2")
            .bind(name)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(description) = payload.description {
        sqlx::query("UPDATE rewards SET description = $1, updated_at = NOW() WHERE id = $2")
            .bind(clean_html(&description))
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(cost) = payload.cost {
        if cost < 0 {
            return Err(AppError::BadRequest("Cost cannot be negative".to_string()));
        }
        sqlx::query("UPDATE rewards SET cost = $1, updated_at = NOW() WHERE id = $2")
            .bind(cost)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(stock) = payload.stock {
        if stock < 0 {
            return Err(AppError::BadRequest("Stock cannot be negative".to_string()));
        }
        sqlx::query("UPDATE rewards SET stock = $1, updated_at = NOW() WHERE id = $2")
            .bind(stock)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    Ok(StatusCode::OK)
}

/// Deletes a reward and, via cascade, its redemption records.
pub async fn delete_reward(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM rewards WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Reward not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Sessions (monitoring)
// ---------------------------------------------------------------------------

/// Lists every session with its user and quiz for monitoring.
/// Admin only.
pub async fn list_sessions(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, AdminSessionRow>(
        r#"
        SELECT s.id, u.username, q.title AS quiz_title, s.completed, s.score,
               s.started_at, s.ended_at
        FROM quiz_sessions s
        JOIN users u ON u.id = s.user_id
        JOIN quizzes q ON q.id = s.quiz_id
        ORDER BY s.started_at DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(rows))
}

#[derive(Debug, serde::Serialize, sqlx::FromRow)]
pub struct AdminSessionRow {
    pub id: i64,
    pub username: String,
    pub quiz_title: String,
    pub completed: bool,
    pub score: i64,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

// ---------------------------------------------------------------------------

async fn ensure_exists(
    pool: &PgPool,
    table: &str,
    id: i64,
    not_found: &str,
) -> Result<(), AppError> {
    let exists =
        sqlx::query_scalar::<_, bool>(&format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE id = $1)"))
            .bind(id)
            .fetch_one(pool)
            .await?;

    if !exists {
        return Err(AppError::NotFound(not_found.to_string()));
    }
    Ok(())
}
