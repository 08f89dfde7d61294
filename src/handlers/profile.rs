// src/handlers/profile.rs

use axum::{
    Json,
    extract::{Extension, State},
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attempt::AttemptSummary,
        profile::{Profile, UpdateProfileRequest},
        user::{MeResponse, User},
    },
    utils::{html::clean_optional, jwt::Claims},
};

/// Returns the current user together with their academic profile.
pub async fn get_me(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(&pool)
        .await?;

    Ok(Json(MeResponse { user, profile }))
}

/// Creates or replaces the caller's profile.
pub async fn update_profile(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    payload.check_semester().map_err(AppError::BadRequest)?;

    let user_id = claims.user_id()?;

    let profile = sqlx::query_as::<_, Profile>(
        r#"
        INSERT INTO profiles (
            user_id, degree, current_semester, student_id, institution,
            subject_specialization, bio, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            degree = excluded.degree,
            current_semester = excluded.current_semester,
            student_id = excluded.student_id,
            institution = excluded.institution,
            subject_specialization = excluded.subject_specialization,
            bio = excluded.bio,
            updated_at = excluded.updated_at
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(payload.degree)
    .bind(payload.current_semester)
    .bind(clean_optional(payload.student_id.as_deref()))
    .bind(clean_optional(payload.institution.as_deref()))
    .bind(clean_optional(payload.subject_specialization.as_deref()))
    .bind(clean_optional(payload.bio.as_deref()))
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to save profile of user {}: {:?}", user_id, e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(profile))
}

/// Lists the caller's attempts, newest first. Students only.
pub async fn list_my_attempts(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.require_student()?;

    let attempts = sqlx::query_as::<_, AttemptSummary>(
        r#"
        SELECT a.id, a.quiz_id, q.title AS quiz_title, a.status,
               a.start_time, a.end_time, a.score
        FROM quiz_attempts a
        JOIN quizzes q ON q.id = a.quiz_id
        WHERE a.student_id = ?
        ORDER BY a.start_time DESC, a.id DESC
        "#,
    )
    .bind(student_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(attempts))
}
