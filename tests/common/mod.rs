// tests/common/mod.rs

#![allow(dead_code)]

use quizhub::{
    config::Config,
    db::{self, MIGRATOR},
    routes,
    state::AppState,
};
use serde_json::{Value, json};
use sqlx::SqlitePool;

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub client: reqwest::Client,
}

/// Spawns the app on a random port, backed by a fresh in-memory database.
pub async fn spawn_app() -> TestApp {
    let pool = db::connect_in_memory()
        .await
        .expect("Failed to open in-memory SQLite");

    MIGRATOR.run(&pool).await.expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        admin_username: None,
        admin_password: None,
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

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        address,
        pool,
        client,
    }
}

pub fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub token: String,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, token: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put(&self, path: &str, token: &str, body: &Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn login(&self, username: &str, password: &str) -> Value {
        let response = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Login failed");
        assert_eq!(response.status().as_u16(), 200, "login of {}", username);
        response.json().await.expect("Failed to parse login json")
    }

    /// Registers a user with the given role and logs them in.
    pub async fn user(&self, role: &str) -> TestUser {
        let username = unique_name(&role[..2]);

        let response = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "username": username,
                "password": "password123",
                "role": role
            }))
            .send()
            .await
            .expect("Register failed");
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();

        let login = self.login(&username, "password123").await;

        TestUser {
            id: body["id"].as_i64().unwrap(),
            username,
            token: login["token"].as_str().unwrap().to_string(),
        }
    }

    /// A teacher account flagged as administrator directly in the database.
    pub async fn admin(&self) -> TestUser {
        let user = self.user("teacher").await;

        sqlx::query("UPDATE users SET is_admin = TRUE WHERE id = ?")
            .bind(user.id)
            .execute(&self.pool)
            .await
            .unwrap();

        let login = self.login(&user.username, "password123").await;
        TestUser {
            token: login["token"].as_str().unwrap().to_string(),
            ..user
        }
    }

    /// A student with a filled in profile.
    pub async fn student(&self, degree: &str, semester: i64) -> TestUser {
        let student = self.user("student").await;

        let response = self
            .put(
                "/api/me/profile",
                &student.token,
                &json!({ "degree": degree, "current_semester": semester }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 200);

        student
    }

    /// Creates a quiz with `questions` questions. The first option of each is correct.
    pub async fn quiz(&self, teacher: &TestUser, questions: usize, intent: Value) -> Value {
        let questions: Vec<Value> = (0..questions)
            .map(|i| {
                json!({
                    "text": format!("Question {}", i + 1),
                    "options": [
                        { "text": "Right", "is_correct": true },
                        { "text": "Wrong", "is_correct": false }
                    ]
                })
            })
            .collect();

        let mut body = json!({
            "title": unique_name("quiz"),
            "description": "Integration test quiz",
            "questions": questions
        });
        if let (Some(body), Some(intent)) = (body.as_object_mut(), intent.as_object()) {
            body.extend(intent.clone());
        }

        let response = self.post("/api/quizzes", &teacher.token, &body).await;
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.unwrap()
    }

    pub async fn start(&self, student: &TestUser, quiz_id: i64) -> reqwest::Response {
        self.post(
            &format!("/api/quizzes/{}/attempts", quiz_id),
            &student.token,
            &json!({}),
        )
        .await
    }

    pub async fn answer(
        &self,
        student: &TestUser,
        attempt_id: i64,
        question_id: i64,
        option_id: Option<i64>,
    ) -> reqwest::Response {
        self.post(
            &format!("/api/attempts/{}/responses", attempt_id),
            &student.token,
            &json!({
                "question_id": question_id,
                "option_id": option_id,
                "time_taken": 5.0
            }),
        )
        .await
    }
}

/// (question id, correct option id, wrong option id) of every question of a quiz.
pub fn question_ids(quiz: &Value) -> Vec<(i64, i64, i64)> {
    quiz["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| {
            let options = q["options"].as_array().unwrap();
            let correct = options
                .iter()
                .find(|o| o["is_correct"] == true)
                .unwrap();
            let wrong = options
                .iter()
                .find(|o| o["is_correct"] == false)
                .unwrap();
            (
                q["id"].as_i64().unwrap(),
                correct["id"].as_i64().unwrap(),
                wrong["id"].as_i64().unwrap(),
            )
        })
        .collect()
}
