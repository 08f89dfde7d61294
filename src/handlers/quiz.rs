// src/handlers/quiz.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attempt::AttemptStatus,
        question::{CreateQuestionRequest, PublicQuestion},
        quiz::{
            CreateQuizRequest, EligibleQuiz, PublicQuizDetail, Quiz, QuizDetail,
            UpdateQuizRequest,
        },
        user::UserRole,
    },
    services::{eligibility, quiz as quiz_service},
    utils::{html::clean_html, jwt::Claims},
};

/// Loads a quiz and checks that the caller created it.
async fn owned_quiz(
    conn: &mut SqliteConnection,
    quiz_id: i64,
    claims: &Claims,
) -> Result<Quiz, AppError> {
    let teacher_id = claims.require_teacher()?;
    let quiz = quiz_service::find_quiz(conn, quiz_id).await?;

    if quiz.created_by != teacher_id {
        return Err(AppError::Forbidden(
            "You can only manage your own quizzes.".to_string(),
        ));
    }
    Ok(quiz)
}

/// Creates a quiz together with its questions in one transaction.
/// Teachers only.
pub async fn create_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let teacher_id = claims.require_teacher()?;

    let mut tx = pool.begin().await?;

    let quiz = sqlx::query_as::<_, Quiz>(
        r#"
        INSERT INTO quizzes (title, description, created_by, intent_degree, intent_semester)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(clean_html(&payload.title))
    .bind(clean_html(&payload.description))
    .bind(teacher_id)
    .bind(payload.intent_degree)
    .bind(&payload.intent_semester)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let mut questions = Vec::with_capacity(payload.questions.len());
    for question in &payload.questions {
        questions.push(quiz_service::insert_question(&mut tx, quiz.id, question).await?);
    }

    tx.commit().await?;

    tracing::info!(
        "Teacher {} created quiz {} with {} questions",
        teacher_id,
        quiz.id,
        questions.len()
    );
    Ok((StatusCode::CREATED, Json(QuizDetail { quiz, questions })))
}

/// Lists the quizzes created by the calling teacher.
pub async fn list_my_quizzes(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let teacher_id = claims.require_teacher()?;

    let quizzes = sqlx::query_as::<_, Quiz>(
        "SELECT * FROM quizzes WHERE created_by = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(teacher_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(quizzes))
}

/// Returns a quiz.
///
/// The owner (and admins) get the full view with correct flags. Students get
/// the questions without them.
pub async fn get_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let mut conn = pool.acquire().await?;

    let quiz = quiz_service::find_quiz(&mut conn, id).await?;
    let questions = quiz_service::questions_with_options(&mut conn, id).await?;

    if quiz.created_by == user_id || claims.is_admin {
        return Ok(Json(serde_json::to_value(QuizDetail { quiz, questions })?));
    }

    if claims.role != UserRole::Student {
        return Err(AppError::Forbidden(
            "You can only view your own quizzes.".to_string(),
        ));
    }

    let questions = questions.into_iter().map(PublicQuestion::from).collect();
    Ok(Json(serde_json::to_value(PublicQuizDetail {
        quiz,
        questions,
    })?))
}

/// Updates quiz metadata. Owner only.
pub async fn update_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut conn = pool.acquire().await?;
    let current = owned_quiz(&mut conn, id, &claims).await?;

    let title = payload
        .title
        .as_deref()
        .map(clean_html)
        .unwrap_or(current.title);
    let description = payload
        .description
        .as_deref()
        .map(clean_html)
        .unwrap_or(current.description);
    let (intent_degree, intent_semester) = if payload.clear_intent {
        (None, None)
    } else {
        (
            payload.intent_degree.or(current.intent_degree),
            payload.intent_semester.or(current.intent_semester),
        )
    };

    let quiz = sqlx::query_as::<_, Quiz>(
        r#"
        UPDATE quizzes
        SET title = ?, description = ?, intent_degree = ?, intent_semester = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(title)
    .bind(description)
    .bind(intent_degree)
    .bind(intent_semester)
    .bind(id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        tracing::error!("Failed to update quiz {}: {:?}", id, e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(quiz))
}

/// Deletes a quiz with its questions, attempts and analytics. Owner or admin.
pub async fn delete_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;

    if !claims.is_admin {
        owned_quiz(&mut conn, id, &claims).await?;
    }

    let result = sqlx::query("DELETE FROM quizzes WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    tracing::info!("Quiz {} deleted by user {}", id, claims.sub);
    Ok(Json(json!({ "message": "Quiz deleted successfully" })))
}

/// Appends a question to a quiz. Owner only.
pub async fn add_question(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = pool.begin().await?;
    owned_quiz(&mut tx, id, &claims).await?;
    let question = quiz_service::insert_question(&mut tx, id, &payload).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(question)))
}

#[derive(FromRow)]
struct QuizListingRow {
    #[sqlx(flatten)]
    quiz: Quiz,
    question_count: i64,
    attempt_id: Option<i64>,
    attempt_status: Option<AttemptStatus>,
}

/// Lists the quizzes the calling student may attempt, each with the state of
/// the student's attempt if there is one.
pub async fn list_eligible_quizzes(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.require_student()?;
    let mut conn = pool.acquire().await?;

    let (role, profile) = eligibility::load_candidate(&mut conn, student_id).await?;

    let rows = sqlx::query_as::<_, QuizListingRow>(
        r#"
        SELECT
            q.*,
            (SELECT COUNT(*) FROM questions WHERE quiz_id = q.id) AS question_count,
            a.id AS attempt_id,
            a.status AS attempt_status
        FROM quizzes q
        LEFT JOIN quiz_attempts a ON a.quiz_id = q.id AND a.student_id = ?
        ORDER BY q.created_at DESC, q.id DESC
        "#,
    )
    .bind(student_id)
    .fetch_all(&mut *conn)
    .await?;

    let eligible: Vec<EligibleQuiz> = rows
        .into_iter()
        .filter(|row| eligibility::check(role, profile.as_ref(), &row.quiz).is_ok())
        .map(|row| EligibleQuiz {
            quiz: row.quiz,
            question_count: row.question_count,
            attempt_id: row.attempt_id,
            attempt_status: row.attempt_status,
        })
        .collect();

    Ok(Json(eligible))
}
