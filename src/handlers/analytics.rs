// src/handlers/analytics.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    services::{analytics, quiz as quiz_service, rbac},
    utils::jwt::Claims,
};

/// Analytics report of a quiz: attempt statistics, grade distribution and
/// per-question difficulty.
///
/// Visible to the quiz owner and to anyone granted `analytics:read`.
pub async fn get_quiz_analytics(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let mut tx = pool.begin().await?;

    let quiz = quiz_service::find_quiz(&mut tx, id).await?;
    if quiz.created_by != user_id
        && !rbac::user_has_permission(&mut tx, user_id, "analytics", "read").await?
    {
        return Err(AppError::Forbidden(
            "You are not allowed to view analytics of this quiz.".to_string(),
        ));
    }

    let report = analytics::quiz_report(&mut tx, id).await?;
    tx.commit().await?;

    Ok(Json(report))
}
