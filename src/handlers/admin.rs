// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{
        attempt::QuizAttempt,
        user::{User, UserRole},
    },
    services::{analytics, attempt as attempt_service},
    utils::jwt::Claims,
};

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id DESC")
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list users: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(users))
}

/// DTO for Admin updating a user. Absent fields are left untouched.
#[derive(Debug, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub role: Option<UserRole>,
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
}

/// Updates role and account flags of a user.
/// Admin only. An admin cannot revoke their own rights or disable themselves.
pub async fn update_user(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if id == claims.user_id()?
        && (payload.is_admin == Some(false) || payload.is_active == Some(false))
    {
        return Err(AppError::BadRequest(
            "Cannot revoke your own administrator access".to_string(),
        ));
    }

    let current = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET role = ?, is_admin = ?, is_active = ? WHERE id = ? RETURNING *",
    )
    .bind(payload.role.unwrap_or(current.role))
    .bind(payload.is_admin.unwrap_or(current.is_admin))
    .bind(payload.is_active.unwrap_or(current.is_active))
    .bind(id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to update user {}: {:?}", id, e);
        AppError::InternalServerError(e.to_string())
    })?;

    tracing::info!(
        "User {} updated: role={}, admin={}, active={}",
        user.id,
        user.role,
        user.is_admin,
        user.is_active
    );
    Ok(Json(user))
}

/// Deletes a user by ID.
/// Admin only. Prevents deleting self.
///
/// Attempts and responses of the user go with it, so the analytics of every
/// quiz and question they touched are recomputed in the same transaction.
pub async fn delete_user(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if id == claims.user_id()? {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let mut tx = pool.begin().await?;

    // Quizzes owned by the user are removed by the cascade
    let attempts = sqlx::query_as::<_, QuizAttempt>(
        r#"
        SELECT a.* FROM quiz_attempts a
        JOIN quizzes q ON q.id = a.quiz_id
        WHERE a.student_id = ? AND q.created_by != ?
        "#,
    )
    .bind(id)
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    let mut triggers = Vec::new();
    for attempt in &attempts {
        triggers.extend(attempt_service::dependent_triggers(&mut tx, attempt).await?);
    }

    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    analytics::dispatch_all(&mut tx, triggers).await?;
    tx.commit().await?;

    tracing::info!(
        "User {} deleted with {} attempts",
        id,
        attempts.len()
    );
    Ok(StatusCode::NO_CONTENT)
}
