// src/handlers/attempt.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::attempt::{StartAttemptResponse, StartOutcome, SubmitAnswerRequest},
    services::{attempt as attempt_service, quiz as quiz_service},
    utils::jwt::Claims,
};

/// Starts (or resumes) the caller's attempt at a quiz.
///
/// 201 Created for a new attempt, 200 OK when an attempt already existed.
/// `outcome` tells the client whether to continue or go to the results.
pub async fn start_attempt(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.require_student()?;

    let (attempt, outcome) = attempt_service::start(&pool, student_id, quiz_id).await?;

    let status = match outcome {
        StartOutcome::Created => StatusCode::CREATED,
        StartOutcome::Resumed | StartOutcome::AlreadyCompleted => StatusCode::OK,
    };
    Ok((status, Json(StartAttemptResponse { outcome, attempt })))
}

/// Opens an attempt for answering.
/// A completed attempt redirects to its results.
pub async fn take_attempt(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let student_id = claims.require_student()?;

    match attempt_service::take(&pool, id, student_id).await? {
        Some(view) => Ok(Json(view).into_response()),
        None => Ok(Redirect::to(&format!("/api/attempts/{}/result", id)).into_response()),
    }
}

/// Records the answer to one question. Answering again overwrites it.
pub async fn submit_answer(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let student_id = claims.require_student()?;

    let recorded = attempt_service::record_response(&pool, id, student_id, &payload).await?;
    Ok(Json(recorded))
}

/// Completes the attempt and returns the scored result.
pub async fn submit_attempt(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.require_student()?;

    let result = attempt_service::submit(&pool, id, student_id).await?;
    Ok(Json(result))
}

pub async fn get_result(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.require_student()?;
    let mut conn = pool.acquire().await?;

    let result = attempt_service::result(&mut conn, id, student_id).await?;
    Ok(Json(result))
}

/// Resets a student's attempt so the quiz can be taken again.
/// Allowed for the owner of the quiz and for admins.
pub async fn delete_attempt(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempt = {
        let mut conn = pool.acquire().await?;
        let attempt = attempt_service::find_attempt(&mut conn, id).await?;
        let quiz = quiz_service::find_quiz(&mut conn, attempt.quiz_id).await?;

        if quiz.created_by != user_id && !claims.is_admin {
            return Err(AppError::Forbidden(
                "Only the quiz owner can reset attempts.".to_string(),
            ));
        }
        attempt
    };

    attempt_service::delete(&pool, &attempt).await?;

    Ok(Json(json!({ "message": "Attempt deleted successfully" })))
}
