// src/services/scoring.rs

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptStatus, QuizAttempt},
        question::QuestionOption,
    },
};

/// The parts of a stored response that scoring and analytics look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseMark {
    pub is_correct: bool,
    pub answered: bool,
    pub time_taken_seconds: Option<f64>,
}

#[derive(FromRow)]
struct MarkRow {
    is_correct: bool,
    selected_option_id: Option<i64>,
    time_taken_seconds: Option<f64>,
}

impl From<MarkRow> for ResponseMark {
    fn from(row: MarkRow) -> Self {
        ResponseMark {
            is_correct: row.is_correct,
            answered: row.selected_option_id.is_some(),
            time_taken_seconds: row.time_taken_seconds,
        }
    }
}

/// Counts over a set of responses.
/// `correct + wrong + unanswered == total` holds for every tally built by `from_marks`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub total: i64,
    pub correct: i64,
    pub wrong: i64,
    pub unanswered: i64,
}

impl Tally {
    pub fn from_marks(marks: &[ResponseMark]) -> Self {
        marks.iter().fold(Tally::default(), |mut tally, mark| {
            tally.total += 1;
            if mark.is_correct {
                tally.correct += 1;
            } else if mark.answered {
                tally.wrong += 1;
            } else {
                tally.unanswered += 1;
            }
            tally
        })
    }

    /// Share of correct answers in percent. An empty tally scores 0.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f64 * 100.0 / self.total as f64
    }
}

/// Correctness of a response is a function of its selection alone:
/// no selection is always wrong, never ungraded.
pub fn derive_is_correct(selected: Option<&QuestionOption>) -> bool {
    selected.is_some_and(|option| option.is_correct)
}

/// Seconds between start and end of a completed attempt.
pub fn time_taken(
    status: AttemptStatus,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
) -> Option<f64> {
    match (status, end) {
        (AttemptStatus::Completed, Some(end)) => {
            Some((end - start).num_milliseconds() as f64 / 1000.0)
        }
        _ => None,
    }
}

pub async fn load_attempt_marks(
    conn: &mut SqliteConnection,
    attempt_id: i64,
) -> Result<Vec<ResponseMark>, AppError> {
    let rows = sqlx::query_as::<_, MarkRow>(
        "SELECT is_correct, selected_option_id, time_taken_seconds FROM quiz_responses WHERE attempt_id = ?",
    )
    .bind(attempt_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(ResponseMark::from).collect())
}

pub async fn load_question_marks(
    conn: &mut SqliteConnection,
    question_id: i64,
) -> Result<Vec<ResponseMark>, AppError> {
    let rows = sqlx::query_as::<_, MarkRow>(
        "SELECT is_correct, selected_option_id, time_taken_seconds FROM quiz_responses WHERE question_id = ?",
    )
    .bind(question_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(ResponseMark::from).collect())
}

/// Recomputes score, counts and time taken of an attempt from all of its responses.
///
/// Always a full pass: stored counters are overwritten, never incremented.
pub async fn recompute_attempt(
    conn: &mut SqliteConnection,
    attempt_id: i64,
) -> Result<QuizAttempt, AppError> {
    let attempt = sqlx::query_as::<_, QuizAttempt>("SELECT * FROM quiz_attempts WHERE id = ?")
        .bind(attempt_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    let marks = load_attempt_marks(conn, attempt_id).await?;
    let tally = Tally::from_marks(&marks);
    let elapsed = time_taken(attempt.status, attempt.start_time, attempt.end_time);

    let updated = sqlx::query_as::<_, QuizAttempt>(
        r#"
        UPDATE quiz_attempts SET
            total_questions = ?,
            correct_answers = ?,
            wrong_answers = ?,
            unanswered = ?,
            score = ?,
            time_taken_seconds = COALESCE(?, time_taken_seconds)
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(tally.total)
    .bind(tally.correct)
    .bind(tally.wrong)
    .bind(tally.unanswered)
    .bind(tally.percentage())
    .bind(elapsed)
    .bind(attempt_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        tracing::error!("Failed to store score of attempt {}: {:?}", attempt_id, e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(updated)
}
