// src/services/attempt.rs

//! Attempt lifecycle: start, take, answer, submit, result, reset.
//!
//! Operations that write take the pool and run in a single transaction, with
//! the analytics recompute they trigger inside that same transaction.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    error::AppError,
    models::{
        attempt::{
            AnswerRecorded, AttemptResult, AttemptStatus, QuizAttempt, QuizResponse,
            ResponseDetail, StartOutcome, SubmitAnswerRequest, TakeQuizResponse,
        },
        question::PublicQuestion,
    },
    services::{
        analytics::{self, AnalyticsTrigger},
        eligibility, quiz, scoring,
    },
};

pub async fn find_attempt(
    conn: &mut SqliteConnection,
    attempt_id: i64,
) -> Result<QuizAttempt, AppError> {
    sqlx::query_as::<_, QuizAttempt>("SELECT * FROM quiz_attempts WHERE id = ?")
        .bind(attempt_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))
}

/// An attempt that belongs to `student_id`. Other students' attempts count as missing.
pub async fn find_owned(
    conn: &mut SqliteConnection,
    attempt_id: i64,
    student_id: i64,
) -> Result<QuizAttempt, AppError> {
    let attempt = find_attempt(conn, attempt_id).await?;
    if attempt.student_id != student_id {
        return Err(AppError::NotFound("Attempt not found".to_string()));
    }
    Ok(attempt)
}

async fn find_for_pair(
    conn: &mut SqliteConnection,
    student_id: i64,
    quiz_id: i64,
) -> Result<Option<QuizAttempt>, AppError> {
    let attempt = sqlx::query_as::<_, QuizAttempt>(
        "SELECT * FROM quiz_attempts WHERE student_id = ? AND quiz_id = ?",
    )
    .bind(student_id)
    .bind(quiz_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(attempt)
}

/// What to do with an attempt that already exists for (student, quiz).
fn outcome_for_existing(attempt: &QuizAttempt) -> Result<StartOutcome, AppError> {
    match attempt.status {
        AttemptStatus::Completed => Ok(StartOutcome::AlreadyCompleted),
        AttemptStatus::Started | AttemptStatus::InProgress => Ok(StartOutcome::Resumed),
        AttemptStatus::Abandoned => Err(AppError::Conflict(
            "This attempt was abandoned and cannot be restarted.".to_string(),
        )),
    }
}

/// Starts `quiz_id` for `student_id`, or hands back the attempt that already exists.
///
/// The insert and the eligibility check share a transaction: an ineligible
/// student leaves no attempt behind. A concurrent start that wins the race on
/// the (student, quiz) constraint makes this call resume the winner's attempt.
pub async fn start(
    pool: &SqlitePool,
    student_id: i64,
    quiz_id: i64,
) -> Result<(QuizAttempt, StartOutcome), AppError> {
    let mut tx = pool.begin().await?;

    let quiz = quiz::find_quiz(&mut tx, quiz_id).await?;

    if let Some(existing) = find_for_pair(&mut tx, student_id, quiz_id).await? {
        let outcome = outcome_for_existing(&existing)?;
        return Ok((existing, outcome));
    }

    let inserted = sqlx::query_as::<_, QuizAttempt>(
        r#"
        INSERT INTO quiz_attempts (student_id, quiz_id, status, start_time)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(student_id, quiz_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(student_id)
    .bind(quiz_id)
    .bind(AttemptStatus::Started)
    .bind(Utc::now())
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create attempt: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let Some(attempt) = inserted else {
        let existing = find_for_pair(&mut tx, student_id, quiz_id)
            .await?
            .ok_or(AppError::InternalServerError(
                "Attempt vanished after a start collision".to_string(),
            ))?;
        let outcome = outcome_for_existing(&existing)?;
        return Ok((existing, outcome));
    };

    let (role, profile) = eligibility::load_candidate(&mut tx, student_id).await?;
    if let Err(reason) = eligibility::check(role, profile.as_ref(), &quiz) {
        tx.rollback().await?;
        tracing::warn!(
            "Student {} is not eligible for quiz {}: {}",
            student_id,
            quiz_id,
            reason
        );
        return Err(AppError::Forbidden(reason.to_string()));
    }

    analytics::dispatch(&mut tx, AnalyticsTrigger::AttemptChanged { quiz_id }).await?;
    tx.commit().await?;

    tracing::info!(
        "Student {} started quiz {} (attempt {})",
        student_id,
        quiz_id,
        attempt.id
    );
    Ok((attempt, StartOutcome::Created))
}

async fn set_status(
    conn: &mut SqliteConnection,
    attempt_id: i64,
    status: AttemptStatus,
) -> Result<QuizAttempt, AppError> {
    let attempt = sqlx::query_as::<_, QuizAttempt>(
        "UPDATE quiz_attempts SET status = ? WHERE id = ? RETURNING *",
    )
    .bind(status)
    .bind(attempt_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(attempt)
}

/// Moves a `started` attempt to `in_progress`. No-op for any other status.
async fn mark_in_progress(
    conn: &mut SqliteConnection,
    attempt: QuizAttempt,
) -> Result<QuizAttempt, AppError> {
    if attempt.status != AttemptStatus::Started {
        return Ok(attempt);
    }

    let next = attempt.status.begin_answering().map_err(|t| {
        AppError::BadRequest(format!("Cannot move attempt from {:?} to {:?}", t.from, t.to))
    })?;
    let updated = set_status(conn, attempt.id, next).await?;
    analytics::dispatch(
        conn,
        AnalyticsTrigger::AttemptChanged {
            quiz_id: updated.quiz_id,
        },
    )
    .await?;

    Ok(updated)
}

async fn responses_of(
    conn: &mut SqliteConnection,
    attempt_id: i64,
) -> Result<Vec<QuizResponse>, AppError> {
    let responses = sqlx::query_as::<_, QuizResponse>(
        "SELECT * FROM quiz_responses WHERE attempt_id = ? ORDER BY answered_at, id",
    )
    .bind(attempt_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(responses)
}

/// Opens an attempt for answering.
///
/// Returns `Ok(None)` for a completed attempt: there is nothing left to take
/// and the caller should show the results instead.
pub async fn take(
    pool: &SqlitePool,
    attempt_id: i64,
    student_id: i64,
) -> Result<Option<TakeQuizResponse>, AppError> {
    let mut tx = pool.begin().await?;

    let attempt = find_owned(&mut tx, attempt_id, student_id).await?;
    match attempt.status {
        AttemptStatus::Completed => return Ok(None),
        AttemptStatus::Abandoned => {
            return Err(AppError::Conflict("This attempt was abandoned.".to_string()));
        }
        AttemptStatus::Started | AttemptStatus::InProgress => {}
    }

    let attempt = mark_in_progress(&mut tx, attempt).await?;
    let questions = quiz::questions_with_options(&mut tx, attempt.quiz_id)
        .await?
        .into_iter()
        .map(PublicQuestion::from)
        .collect();
    let responses = responses_of(&mut tx, attempt.id).await?;

    tx.commit().await?;

    Ok(Some(TakeQuizResponse {
        attempt,
        questions,
        responses,
    }))
}

/// Records (or overwrites) the answer to one question of an open attempt.
pub async fn record_response(
    pool: &SqlitePool,
    attempt_id: i64,
    student_id: i64,
    req: &SubmitAnswerRequest,
) -> Result<AnswerRecorded, AppError> {
    let mut tx = pool.begin().await?;

    let attempt = find_owned(&mut tx, attempt_id, student_id).await?;
    if !attempt.status.accepts_responses() {
        return Err(AppError::BadRequest(match attempt.status {
            AttemptStatus::Completed => "Quiz already completed".to_string(),
            _ => "Attempt is no longer open".to_string(),
        }));
    }

    let question = quiz::find_question_in_quiz(&mut tx, attempt.quiz_id, req.question_id).await?;
    let selected = match req.option_id {
        Some(option_id) => Some(quiz::find_option_of_question(&mut tx, question.id, option_id).await?),
        None => None,
    };
    let is_correct = scoring::derive_is_correct(selected.as_ref());
    let time_taken = req.time_taken.unwrap_or(0.0);

    sqlx::query(
        r#"
        INSERT INTO quiz_responses (
            attempt_id, question_id, selected_option_id, is_correct, answered_at, time_taken_seconds
        )
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(attempt_id, question_id) DO UPDATE SET
            selected_option_id = excluded.selected_option_id,
            is_correct = excluded.is_correct,
            answered_at = excluded.answered_at,
            time_taken_seconds = excluded.time_taken_seconds
        "#,
    )
    .bind(attempt.id)
    .bind(question.id)
    .bind(selected.as_ref().map(|o| o.id))
    .bind(is_correct)
    .bind(Utc::now())
    .bind(time_taken)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to save response: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    mark_in_progress(&mut tx, attempt).await?;
    analytics::dispatch(
        &mut tx,
        AnalyticsTrigger::ResponseChanged {
            question_id: question.id,
        },
    )
    .await?;

    let correct_option_id = quiz::first_correct_option(&mut tx, question.id).await?;
    tx.commit().await?;

    Ok(AnswerRecorded {
        success: true,
        is_correct,
        correct_option_id,
    })
}

async fn response_details(
    conn: &mut SqliteConnection,
    attempt_id: i64,
) -> Result<Vec<ResponseDetail>, AppError> {
    let details = sqlx::query_as::<_, ResponseDetail>(
        r#"
        SELECT
            r.question_id,
            q.text AS question_text,
            r.selected_option_id,
            o.text AS selected_option_text,
            r.is_correct,
            r.time_taken_seconds
        FROM quiz_responses r
        JOIN questions q ON q.id = r.question_id
        LEFT JOIN options o ON o.id = r.selected_option_id
        WHERE r.attempt_id = ?
        ORDER BY r.question_id
        "#,
    )
    .bind(attempt_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(details)
}

/// Finishes an attempt and scores it. Submitting a completed attempt again
/// changes nothing and returns the stored result.
pub async fn submit(
    pool: &SqlitePool,
    attempt_id: i64,
    student_id: i64,
) -> Result<AttemptResult, AppError> {
    let mut tx = pool.begin().await?;

    let attempt = find_owned(&mut tx, attempt_id, student_id).await?;
    if attempt.status == AttemptStatus::Completed {
        let responses = response_details(&mut tx, attempt.id).await?;
        return Ok(AttemptResult { attempt, responses });
    }

    let next = attempt
        .status
        .complete()
        .map_err(|_| AppError::Conflict("This attempt was abandoned.".to_string()))?;

    sqlx::query("UPDATE quiz_attempts SET status = ?, end_time = ? WHERE id = ?")
        .bind(next)
        .bind(Utc::now())
        .bind(attempt.id)
        .execute(&mut *tx)
        .await?;

    let scored = scoring::recompute_attempt(&mut tx, attempt.id).await?;
    analytics::dispatch(
        &mut tx,
        AnalyticsTrigger::AttemptChanged {
            quiz_id: scored.quiz_id,
        },
    )
    .await?;

    let responses = response_details(&mut tx, scored.id).await?;
    tx.commit().await?;

    tracing::info!(
        "Attempt {} submitted: {:.1}% ({}/{})",
        scored.id,
        scored.score.unwrap_or(0.0),
        scored.correct_answers,
        scored.total_questions
    );
    Ok(AttemptResult {
        attempt: scored,
        responses,
    })
}

/// Results of a completed attempt.
pub async fn result(
    conn: &mut SqliteConnection,
    attempt_id: i64,
    student_id: i64,
) -> Result<AttemptResult, AppError> {
    let attempt = find_owned(conn, attempt_id, student_id).await?;
    if attempt.status != AttemptStatus::Completed {
        return Err(AppError::BadRequest(format!(
            "Please complete the quiz first: /api/attempts/{}",
            attempt.id
        )));
    }

    let responses = response_details(conn, attempt.id).await?;
    Ok(AttemptResult { attempt, responses })
}

/// Analytics rows that depend on `attempt_id`: its quiz and every question it answered.
pub async fn dependent_triggers(
    conn: &mut SqliteConnection,
    attempt: &QuizAttempt,
) -> Result<Vec<AnalyticsTrigger>, AppError> {
    let question_ids: Vec<i64> =
        sqlx::query_scalar("SELECT question_id FROM quiz_responses WHERE attempt_id = ?")
            .bind(attempt.id)
            .fetch_all(&mut *conn)
            .await?;

    let mut triggers = vec![AnalyticsTrigger::AttemptChanged {
        quiz_id: attempt.quiz_id,
    }];
    triggers.extend(
        question_ids
            .into_iter()
            .map(|question_id| AnalyticsTrigger::ResponseChanged { question_id }),
    );
    Ok(triggers)
}

/// Deletes an attempt with its responses and recomputes everything they fed into.
pub async fn delete(pool: &SqlitePool, attempt: &QuizAttempt) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let triggers = dependent_triggers(&mut tx, attempt).await?;

    sqlx::query("DELETE FROM quiz_attempts WHERE id = ?")
        .bind(attempt.id)
        .execute(&mut *tx)
        .await?;

    analytics::dispatch_all(&mut tx, triggers).await?;
    tx.commit().await?;

    tracing::info!("Attempt {} deleted", attempt.id);
    Ok(())
}
