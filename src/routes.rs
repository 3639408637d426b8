// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, leaderboard, quiz, reward, session},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, catalog, sessions, rewards, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let level_routes = Router::new()
        .route("/", get(quiz::list_levels))
        .route("/{slug}", get(quiz::level_quizzes));

    let quiz_routes = Router::new()
        .route("/", get(quiz::list_quizzes))
        .route("/{slug}", get(quiz::quiz_detail))
        .route("/{slug}/start", post(quiz::start_session))
        .route("/{slug}/question", get(session::next_question))
        .route("/{slug}/answer", post(session::submit_answer))
        .route("/{slug}/complete", get(session::quiz_complete));

    let session_routes = Router::new().route("/", get(session::my_sessions));

    let reward_routes = Router::new()
        .route("/", get(reward::list_rewards))
        .route("/history", get(reward::redemption_history))
        .route("/{id}/redeem", post(reward::redeem));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route(
            "/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route("/levels", post(admin::create_level))
        .route(
            "/levels/{id}",
            put(admin::update_level).delete(admin::delete_level),
        )
        .route("/levels/{id}/users", put(admin::assign_level_users))
        .route("/quizzes", post(admin::create_quiz))
        .route(
            "/quizzes/{id}",
            put(admin::update_quiz).delete(admin::delete_quiz),
        )
        .route("/quizzes/{id}/users", put(admin::assign_quiz_users))
        .route("/questions", post(admin::create_question))
        .route(
            "/questions/{id}",
            delete(admin::delete_question).put(admin::update_question),
        )
        .route("/rewards", post(admin::create_reward))
        .route(
            "/rewards/{id}",
            put(admin::update_reward).delete(admin::delete_reward),
        )
        .route("/sessions", get(admin::list_sessions))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let protected = Router::new()
        .nest("/api/levels", level_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/sessions", session_routes)
        .nest("/api/rewards", reward_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .route("/api/leaderboard", get(leaderboard::get_leaderboard))
        .merge(protected)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
