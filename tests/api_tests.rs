// tests/api_tests.rs

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{spawn_app, unique_name};
use quizhub::{
    config::Config,
    db::{self, MIGRATOR},
    routes,
    state::AppState,
};
use serde_json::{Value, json};
use tower::ServiceExt;

#[tokio::test]
async fn router_rejects_missing_token_without_a_server() {
    let pool = db::connect_in_memory().await.unwrap();
    MIGRATOR.run(&pool).await.unwrap();

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "oneshot_secret".to_string(),
        jwt_expiration: 60,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        admin_username: None,
        admin_password: None,
    };
    let app = routes::create_router(AppState { pool, config });

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/quizzes/eligible")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works() {
    let app = spawn_app().await;
    let username = unique_name("u");

    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({
            "username": username,
            "password": "password123",
            "email": "someone@example.com"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["username"], username.as_str());
    assert_eq!(body["role"], "student");
    assert!(body.get("password").is_none(), "hash must not leak");
}

#[tokio::test]
async fn register_fails_validation() {
    let app = spawn_app().await;

    // Username too short
    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({ "username": "yo", "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Malformed email
    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({
            "username": unique_name("u"),
            "password": "password123",
            "email": "not-an-email"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn register_duplicate_is_conflict() {
    let app = spawn_app().await;
    let user = app.user("student").await;

    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({ "username": user.username, "password": "password123" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn login_rejects_wrong_password_and_disabled_accounts() {
    let app = spawn_app().await;
    let user = app.user("student").await;

    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "username": user.username, "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    sqlx::query("UPDATE users SET is_active = FALSE WHERE id = ?")
        .bind(user.id)
        .execute(&app.pool)
        .await
        .unwrap();

    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "username": user.username, "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/api/me")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = app.get("/api/me", "garbage").await;
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn test_profile_flow() {
    let app = spawn_app().await;
    let student = app.user("student").await;

    // No profile yet
    let me: Value = app.get("/api/me", &student.token).await.json().await.unwrap();
    assert_eq!(me["username"], student.username.as_str());
    assert!(me["profile"].is_null());

    // mtech only has four semesters
    let response = app
        .put(
            "/api/me/profile",
            &student.token,
            &json!({ "degree": "mtech", "current_semester": 5 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);

    // Unknown degree
    let response = app
        .put(
            "/api/me/profile",
            &student.token,
            &json!({ "degree": "phd", "current_semester": 1 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 422);

    let response = app
        .put(
            "/api/me/profile",
            &student.token,
            &json!({
                "degree": "btech",
                "current_semester": 3,
                "institution": "<script>alert(1)</script>Tech Institute"
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    // Upsert replaces the previous values
    let response = app
        .put(
            "/api/me/profile",
            &student.token,
            &json!({ "degree": "btech", "current_semester": 4 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let me: Value = app.get("/api/me", &student.token).await.json().await.unwrap();
    assert_eq!(me["profile"]["degree"], "btech");
    assert_eq!(me["profile"]["current_semester"], 4);
    assert!(me["profile"]["institution"].is_null());

    let attempts: Vec<Value> = app
        .get("/api/me/attempts", &student.token)
        .await
        .json()
        .await
        .unwrap();
    assert!(attempts.is_empty());
}

#[tokio::test]
async fn test_quiz_management() {
    let app = spawn_app().await;
    let teacher = app.user("teacher").await;
    let other_teacher = app.user("teacher").await;
    let student = app.student("btech", 3).await;

    // Students cannot create quizzes
    let response = app
        .post("/api/quizzes", &student.token, &json!({ "title": "Nope" }))
        .await;
    assert_eq!(response.status().as_u16(), 403);

    // A question needs a correct option
    let response = app
        .post(
            "/api/quizzes",
            &teacher.token,
            &json!({
                "title": "Broken",
                "questions": [{
                    "text": "?",
                    "options": [
                        { "text": "a", "is_correct": false },
                        { "text": "b", "is_correct": false }
                    ]
                }]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let quiz = app.quiz(&teacher, 2, json!({})).await;
    let quiz_id = quiz["id"].as_i64().unwrap();
    assert_eq!(quiz["questions"].as_array().unwrap().len(), 2);

    // Question text is sanitized
    let response = app
        .post(
            &format!("/api/quizzes/{}/questions", quiz_id),
            &teacher.token,
            &json!({
                "text": "What is <b>2 + 2</b>?<script>alert(1)</script>",
                "options": [
                    { "text": "4", "is_correct": true },
                    { "text": "5" }
                ]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let question: Value = response.json().await.unwrap();
    assert_eq!(question["text"], "What is <b>2 + 2</b>?");

    // Owner view carries correct flags, student view does not
    let owner_view: Value = app
        .get(&format!("/api/quizzes/{}", quiz_id), &teacher.token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(owner_view["questions"].as_array().unwrap().len(), 3);
    assert!(owner_view["questions"][0]["options"][0].get("is_correct").is_some());

    let student_view: Value = app
        .get(&format!("/api/quizzes/{}", quiz_id), &student.token)
        .await
        .json()
        .await
        .unwrap();
    assert!(student_view["questions"][0]["options"][0].get("is_correct").is_none());

    // Other teachers can neither view in full nor edit
    let response = app
        .put(
            &format!("/api/quizzes/{}", quiz_id),
            &other_teacher.token,
            &json!({ "title": "Hijacked" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 403);

    let response = app
        .put(
            &format!("/api/quizzes/{}", quiz_id),
            &teacher.token,
            &json!({ "title": "Renamed", "intent_degree": "mtech", "intent_semester": "2" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["title"], "Renamed");
    assert_eq!(updated["intent_degree"], "mtech");

    let mine: Vec<Value> = app
        .get("/api/quizzes/mine", &teacher.token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);

    let response = app
        .delete(&format!("/api/quizzes/{}", quiz_id), &teacher.token)
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .get(&format!("/api/quizzes/{}", quiz_id), &teacher.token)
        .await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn test_admin_user_management() {
    let app = spawn_app().await;
    let admin = app.admin().await;
    let student = app.user("student").await;

    // Non-admins are turned away
    let response = app.get("/api/admin/users", &student.token).await;
    assert_eq!(response.status().as_u16(), 403);

    let users: Vec<Value> = app
        .get("/api/admin/users", &admin.token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(users.len(), 2);

    let response = app
        .put(
            &format!("/api/admin/users/{}", student.id),
            &admin.token,
            &json!({ "role": "teacher" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["role"], "teacher");
    assert_eq!(updated["is_active"], true);

    // No self-deletion
    let response = app
        .delete(&format!("/api/admin/users/{}", admin.id), &admin.token)
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .delete(&format!("/api/admin/users/{}", student.id), &admin.token)
        .await;
    assert_eq!(response.status().as_u16(), 204);

    let response = app
        .delete(&format!("/api/admin/users/{}", student.id), &admin.token)
        .await;
    assert_eq!(response.status().as_u16(), 404);
}
