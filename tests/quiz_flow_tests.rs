// tests/quiz_flow_tests.rs

use common::{admin_token, answer_next_question, login, register_user, seed_quiz, spawn_app, unique_name};

mod common;

#[tokio::test]
async fn unknown_route_is_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_fails_validation() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(format!("{}/api/auth/register", app.address))
        .json(&serde_json::json!({ "username": "yo", "password": "password123" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn quiz_routes_require_auth() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/api/quizzes", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn full_quiz_flow_scores_and_ranks() {
    let app = spawn_app().await;
    let admin = admin_token(&app).await;

    let username = unique_name("taker");
    let user_id = register_user(&app, &username, "password123").await;
    let token = login(&app, &username, "password123").await;

    let quiz = seed_quiz(&app, &admin, user_id, 3).await;

    // The quiz shows up in the eligible listing with its time budget.
    let listing: serde_json::Value = app
        .client
        .get(format!("{}/api/quizzes", app.address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entry = listing
        .as_array()
        .unwrap()
        .iter()
        .find(|q| q["slug"] == quiz.slug.as_str())
        .expect("Quiz missing from listing");
    assert_eq!(entry["question_count"], 3);
    assert_eq!(entry["total_time"], 180);

    // Start; a second start must lose against the unique constraint.
    let response = app
        .client
        .post(format!("{}/api/quizzes/{}/start", app.address, quiz.slug))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let response = app
        .client
        .post(format!("{}/api/quizzes/{}/start", app.address, quiz.slug))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    // Backdate the session start so the completion score is predictable:
    // elapsed ~60s, overhead 6, allotted 180 -> ratio ~0.7, score ~210.
    sqlx::query(
        "UPDATE quiz_sessions SET started_at = NOW() - INTERVAL '60 seconds'
         WHERE user_id = $1 AND quiz_id = $2",
    )
    .bind(user_id)
    .bind(quiz.quiz_id)
    .execute(&app.pool)
    .await
    .unwrap();

    for i in 0..3 {
        let feedback = answer_next_question(&app, &token, &quiz.slug, true).await;
        assert_eq!(feedback["correct"], true);
        assert_eq!(feedback["answered"], i + 1);
        assert_eq!(feedback["completed"], i == 2);
    }

    let summary: serde_json::Value = app
        .client
        .get(format!("{}/api/quizzes/{}/complete", app.address, quiz.slug))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(summary["completed"], true);
    assert_eq!(summary["correct_count"], 3);
    assert_eq!(summary["total_questions"], 3);
    let score = summary["score"].as_i64().unwrap();
    // Exact value depends on request latency; a few seconds of slack.
    assert!((200..=210).contains(&score), "unexpected score {score}");

    // Aggregated total matches the session score.
    let total: i64 =
        sqlx::query_scalar("SELECT total_score FROM user_scores WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(total, score);

    // Leaderboard is public, bounded, and ranked highest-first. Parallel
    // tests share the database, so membership of this particular taker is
    // not guaranteed once the board fills up.
    let leaderboard: serde_json::Value = app
        .client
        .get(format!("{}/api/leaderboard", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let rows = leaderboard.as_array().unwrap();
    assert!(!rows.is_empty() && rows.len() <= 10);
    let totals: Vec<i64> = rows.iter().map(|e| e["total_score"].as_i64().unwrap()).collect();
    assert!(totals.windows(2).all(|w| w[0] >= w[1]), "not ranked: {totals:?}");

    // Score is immutable after completion: further submissions are rejected
    // and the stored score stays put.
    let response = app
        .client
        .post(format!("{}/api/quizzes/{}/answer", app.address, quiz.slug))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "question_id": quiz.question_ids[0], "option_id": null }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    let stored: i64 = sqlx::query_scalar("SELECT score FROM quiz_sessions WHERE user_id = $1 AND quiz_id = $2")
        .bind(user_id)
        .bind(quiz.quiz_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(stored, score);
}

#[tokio::test]
async fn questions_are_never_served_twice() {
    let app = spawn_app().await;
    let admin = admin_token(&app).await;

    let username = unique_name("taker");
    let user_id = register_user(&app, &username, "password123").await;
    let token = login(&app, &username, "password123").await;
    let quiz = seed_quiz(&app, &admin, user_id, 3).await;

    app.client
        .post(format!("{}/api/quizzes/{}/start", app.address, quiz.slug))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    // An unanswered serve is resumed, not reissued as a new slot.
    let first: serde_json::Value = app
        .client
        .get(format!("{}/api/quizzes/{}/question", app.address, quiz.slug))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let second: serde_json::Value = app
        .client
        .get(format!("{}/api/quizzes/{}/question", app.address, quiz.slug))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["question"]["id"], second["question"]["id"]);

    let slots: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM session_answers sa
         JOIN quiz_sessions s ON s.id = sa.session_id WHERE s.user_id = $1")
        .bind(user_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(slots, 1);

    // Answering all three questions serves three distinct ids.
    let mut served = std::collections::HashSet::new();
    let first_id = first["question"]["id"].as_i64().unwrap();
    let options = first["question"]["options"].as_array().unwrap();
    let option_id = options
        .iter()
        .find(|o| o["text"] == "Correct")
        .unwrap()["id"]
        .as_i64()
        .unwrap();
    served.insert(first_id);
    app.client
        .post(format!("{}/api/quizzes/{}/answer", app.address, quiz.slug))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "question_id": first_id, "option_id": option_id }))
        .send()
        .await
        .unwrap();

    for _ in 0..2 {
        let body: serde_json::Value = app
            .client
            .get(format!("{}/api/quizzes/{}/question", app.address, quiz.slug))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let question_id = body["question"]["id"].as_i64().unwrap();
        assert!(served.insert(question_id), "question {question_id} re-served");

        let option_id = body["question"]["options"]
            .as_array()
            .unwrap()
            .iter()
            .find(|o| o["text"] == "Correct")
            .unwrap()["id"]
            .as_i64()
            .unwrap();
        app.client
            .post(format!("{}/api/quizzes/{}/answer", app.address, quiz.slug))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "question_id": question_id, "option_id": option_id }))
            .send()
            .await
            .unwrap();
    }

    assert_eq!(served.len(), 3);
}

#[tokio::test]
async fn simultaneous_serves_create_a_single_slot() {
    let app = spawn_app().await;
    let admin = admin_token(&app).await;

    let username = unique_name("taker");
    let user_id = register_user(&app, &username, "password123").await;
    let token = login(&app, &username, "password123").await;
    let quiz = seed_quiz(&app, &admin, user_id, 1).await;

    app.client
        .post(format!("{}/api/quizzes/{}/start", app.address, quiz.slug))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    // Two serves racing for a fresh session must agree on one question
    // and leave exactly one slot behind.
    let url = format!("{}/api/quizzes/{}/question", app.address, quiz.slug);
    let (res_a, res_b) = tokio::join!(
        app.client.get(&url).bearer_auth(&token).send(),
        app.client.get(&url).bearer_auth(&token).send(),
    );
    let body_a: serde_json::Value = res_a.unwrap().json().await.unwrap();
    let body_b: serde_json::Value = res_b.unwrap().json().await.unwrap();
    assert_eq!(body_a["question"]["id"], body_b["question"]["id"]);

    let slots: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM session_answers sa
         JOIN quiz_sessions s ON s.id = sa.session_id WHERE s.user_id = $1",
    )
    .bind(user_id)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(slots, 1);
}

#[tokio::test]
async fn wrong_and_skipped_answers_count_toward_completion() {
    let app = spawn_app().await;
    let admin = admin_token(&app).await;

    let username = unique_name("taker");
    let user_id = register_user(&app, &username, "password123").await;
    let token = login(&app, &username, "password123").await;
    let quiz = seed_quiz(&app, &admin, user_id, 2).await;

    app.client
        .post(format!("{}/api/quizzes/{}/start", app.address, quiz.slug))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    // One wrong answer.
    let feedback = answer_next_question(&app, &token, &quiz.slug, false).await;
    assert_eq!(feedback["correct"], false);

    // One skip (null option) on the remaining question.
    let body: serde_json::Value = app
        .client
        .get(format!("{}/api/quizzes/{}/question", app.address, quiz.slug))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let question_id = body["question"]["id"].as_i64().unwrap();

    let feedback: serde_json::Value = app
        .client
        .post(format!("{}/api/quizzes/{}/answer", app.address, quiz.slug))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "question_id": question_id, "option_id": null }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(feedback["correct"], false);
    assert_eq!(feedback["completed"], true);

    // Zero correct answers make a zero score regardless of timing.
    let summary: serde_json::Value = app
        .client
        .get(format!("{}/api/quizzes/{}/complete", app.address, quiz.slug))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["correct_count"], 0);
    assert_eq!(summary["score"], 0);
}

#[tokio::test]
async fn zero_question_quiz_completes_with_zero_score() {
    let app = spawn_app().await;
    let admin = admin_token(&app).await;

    let username = unique_name("taker");
    let user_id = register_user(&app, &username, "password123").await;
    let token = login(&app, &username, "password123").await;
    let quiz = seed_quiz(&app, &admin, user_id, 0).await;

    app.client
        .post(format!("{}/api/quizzes/{}/start", app.address, quiz.slug))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    let body: serde_json::Value = app
        .client
        .get(format!("{}/api/quizzes/{}/question", app.address, quiz.slug))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["completed"], true);
    assert_eq!(body["summary"]["score"], 0);
}

#[tokio::test]
async fn ineligible_users_cannot_start() {
    let app = spawn_app().await;
    let admin = admin_token(&app).await;

    let owner = unique_name("owner");
    let owner_id = register_user(&app, &owner, "password123").await;
    let quiz = seed_quiz(&app, &admin, owner_id, 1).await;

    // A user who is not on the quiz roster gets 403.
    let outsider = unique_name("outsider");
    register_user(&app, &outsider, "password123").await;
    let outsider_token = login(&app, &outsider, "password123").await;

    let response = app
        .client
        .post(format!("{}/api/quizzes/{}/start", app.address, quiz.slug))
        .bearer_auth(&outsider_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // Unpublishing makes the quiz ineligible even for rostered users.
    sqlx::query("UPDATE quizzes SET published = FALSE, published_at = NULL WHERE id = $1")
        .bind(quiz.quiz_id)
        .execute(&app.pool)
        .await
        .unwrap();

    let owner_token = login(&app, &owner, "password123").await;
    let response = app
        .client
        .post(format!("{}/api/quizzes/{}/start", app.address, quiz.slug))
        .bearer_auth(&owner_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // Unknown slug is a plain 404.
    let response = app
        .client
        .post(format!("{}/api/quizzes/no-such-quiz/start", app.address))
        .bearer_auth(&owner_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn answers_need_a_served_slot_and_a_matching_option() {
    let app = spawn_app().await;
    let admin = admin_token(&app).await;

    let username = unique_name("taker");
    let user_id = register_user(&app, &username, "password123").await;
    let token = login(&app, &username, "password123").await;
    let quiz = seed_quiz(&app, &admin, user_id, 2).await;

    app.client
        .post(format!("{}/api/quizzes/{}/start", app.address, quiz.slug))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    // Submitting for a question that was never served is rejected.
    let response = app
        .client
        .post(format!("{}/api/quizzes/{}/answer", app.address, quiz.slug))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "question_id": quiz.question_ids[0], "option_id": null }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    // Serve one, then submit an option belonging to the other question.
    let body: serde_json::Value = app
        .client
        .get(format!("{}/api/quizzes/{}/question", app.address, quiz.slug))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let served_id = body["question"]["id"].as_i64().unwrap();
    let other_id = *quiz
        .question_ids
        .iter()
        .find(|id| **id != served_id)
        .unwrap();
    let foreign_option: i64 =
        sqlx::query_scalar("SELECT id FROM question_options WHERE question_id = $1 LIMIT 1")
            .bind(other_id)
            .fetch_one(&app.pool)
            .await
            .unwrap();

    let response = app
        .client
        .post(format!("{}/api/quizzes/{}/answer", app.address, quiz.slug))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "question_id": served_id, "option_id": foreign_option }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Re-submission for the same question overwrites the earlier choice.
    let options = body["question"]["options"].as_array().unwrap();
    let wrong = options.iter().find(|o| o["text"] == "Wrong A").unwrap()["id"]
        .as_i64()
        .unwrap();
    let right = options.iter().find(|o| o["text"] == "Correct").unwrap()["id"]
        .as_i64()
        .unwrap();

    let feedback: serde_json::Value = app
        .client
        .post(format!("{}/api/quizzes/{}/answer", app.address, quiz.slug))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "question_id": served_id, "option_id": wrong }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(feedback["correct"], false);

    let feedback: serde_json::Value = app
        .client
        .post(format!("{}/api/quizzes/{}/answer", app.address, quiz.slug))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "question_id": served_id, "option_id": right }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(feedback["correct"], true);
    assert_eq!(feedback["answered"], 1);
}

#[tokio::test]
async fn session_listing_tracks_progress() {
    let app = spawn_app().await;
    let admin = admin_token(&app).await;

    let username = unique_name("taker");
    let user_id = register_user(&app, &username, "password123").await;
    let token = login(&app, &username, "password123").await;
    let quiz = seed_quiz(&app, &admin, user_id, 2).await;

    app.client
        .post(format!("{}/api/quizzes/{}/start", app.address, quiz.slug))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    answer_next_question(&app, &token, &quiz.slug, true).await;

    let sessions: serde_json::Value = app
        .client
        .get(format!("{}/api/sessions", app.address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let entry = sessions
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["quiz_slug"] == quiz.slug.as_str())
        .expect("Session missing from listing");
    assert_eq!(entry["answered"], 1);
    assert_eq!(entry["total_questions"], 2);
    assert_eq!(entry["completed"], false);
}
