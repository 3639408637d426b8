// tests/common/mod.rs

use quiz_backend::{config::Config, routes, state::AppState};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub struct TestApp {
    pub address: String,
    pub pool: PgPool,
    pub client: reqwest::Client,
}

/// Spawns the app on a random port for testing.
///
/// Requires a running Postgres reachable via DATABASE_URL.
pub async fn spawn_app() -> TestApp {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
        overhead_secs_per_question: 2,
        score_base: 100,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        pool,
        client: reqwest::Client::new(),
    }
}

pub fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

/// Registers a user and returns their id.
pub async fn register_user(app: &TestApp, username: &str, password: &str) -> i64 {
    let response = app
        .client
        .post(format!("{}/api/auth/register", app.address))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(response.status().as_u16(), 201);

    let body: serde_json::Value = response.json().await.unwrap();
    body["id"].as_i64().expect("Register response missing id")
}

pub async fn login(app: &TestApp, username: &str, password: &str) -> String {
    let response = app
        .client
        .post(format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login json");

    response["token"]
        .as_str()
        .expect("Token not found")
        .to_string()
}

/// Registers a fresh user, promotes them to admin directly in the database,
/// and returns a logged-in token.
pub async fn admin_token(app: &TestApp) -> String {
    let username = unique_name("adm");
    let password = "password123";
    register_user(app, &username, password).await;

    sqlx::query("UPDATE users SET role = 'admin' WHERE username = $1")
        .bind(&username)
        .execute(&app.pool)
        .await
        .expect("Failed to promote admin");

    login(app, &username, password).await
}

pub struct SeededQuiz {
    pub slug: String,
    pub quiz_id: i64,
    pub question_ids: Vec<i64>,
}

/// Seeds a published quiz with `question_count` questions (60s allowance,
/// 4 options, the one titled "Correct" flagged) and authorizes `user_id`.
pub async fn seed_quiz(
    app: &TestApp,
    admin_token: &str,
    user_id: i64,
    question_count: usize,
) -> SeededQuiz {
    let level_name = unique_name("level");
    let response = app
        .client
        .post(format!("{}/api/admin/levels", app.address))
        .bearer_auth(admin_token)
        .json(&serde_json::json!({ "name": level_name }))
        .send()
        .await
        .expect("Create level failed");
    assert_eq!(response.status().as_u16(), 201);
    let level: serde_json::Value = response.json().await.unwrap();
    let level_id = level["id"].as_i64().unwrap();

    sqlx::query("INSERT INTO level_users (level_id, user_id) VALUES ($1, $2)")
        .bind(level_id)
        .bind(user_id)
        .execute(&app.pool)
        .await
        .expect("Failed to add user to level");

    let title = unique_name("quiz");
    let response = app
        .client
        .post(format!("{}/api/admin/quizzes", app.address))
        .bearer_auth(admin_token)
        .json(&serde_json::json!({
            "level_id": level_id,
            "title": title,
            "published": true
        }))
        .send()
        .await
        .expect("Create quiz failed");
    assert_eq!(response.status().as_u16(), 201);
    let quiz: serde_json::Value = response.json().await.unwrap();
    let quiz_id = quiz["id"].as_i64().unwrap();
    let slug = quiz["slug"].as_str().unwrap().to_string();

    let mut question_ids = Vec::new();
    for i in 0..question_count {
        let response = app
            .client
            .post(format!("{}/api/admin/questions", app.address))
            .bearer_auth(admin_token)
            .json(&serde_json::json!({
                "quiz_id": quiz_id,
                "text": format!("Question {}", i),
                "time_allowance": 60,
                "options": [
                    { "text": "Correct", "is_correct": true },
                    { "text": "Wrong A" },
                    { "text": "Wrong B" },
                    { "text": "Wrong C" }
                ]
            }))
            .send()
            .await
            .expect("Create question failed");
        assert_eq!(response.status().as_u16(), 201);
        let question: serde_json::Value = response.json().await.unwrap();
        question_ids.push(question["id"].as_i64().unwrap());
    }

    let response = app
        .client
        .put(format!("{}/api/admin/quizzes/{}/users", app.address, quiz_id))
        .bearer_auth(admin_token)
        .json(&serde_json::json!({ "user_ids": [user_id] }))
        .send()
        .await
        .expect("Assign users failed");
    assert_eq!(response.status().as_u16(), 200);

    SeededQuiz {
        slug,
        quiz_id,
        question_ids,
    }
}

/// Serves the next question and answers it with the option named "Correct"
/// (or the first wrong option when `correctly` is false). Returns the
/// feedback payload.
pub async fn answer_next_question(
    app: &TestApp,
    token: &str,
    slug: &str,
    correctly: bool,
) -> serde_json::Value {
    let response = app
        .client
        .get(format!("{}/api/quizzes/{}/question", app.address, slug))
        .bearer_auth(token)
        .send()
        .await
        .expect("Serve question failed");
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["completed"], false, "expected another question");

    let question = &body["question"];
    let question_id = question["id"].as_i64().unwrap();
    let options = question["options"].as_array().unwrap();

    // Correctness flags must never appear in the served payload.
    for option in options {
        assert!(option.get("is_correct").is_none());
    }

    let wanted = if correctly { "Correct" } else { "Wrong A" };
    let option_id = options
        .iter()
        .find(|o| o["text"] == wanted)
        .expect("Expected option not present")["id"]
        .as_i64()
        .unwrap();

    let response = app
        .client
        .post(format!("{}/api/quizzes/{}/answer", app.address, slug))
        .bearer_auth(token)
        .json(&serde_json::json!({ "question_id": question_id, "option_id": option_id }))
        .send()
        .await
        .expect("Submit answer failed");
    assert_eq!(response.status().as_u16(), 200);
    response.json().await.unwrap()
}
