// src/services/analytics.rs

//! Quiz and question statistics.
//!
//! Analytics rows are never updated incrementally. Every mutation of an attempt
//! or a response names what it touched through an [`AnalyticsTrigger`] and hands
//! it to [`dispatch`], which rebuilds the affected row from scratch inside the
//! caller's transaction.
//!
//! Trigger points:
//! * attempt created, moved to in progress, completed or deleted: `AttemptChanged`
//! * response recorded or overwritten, responses deleted: `ResponseChanged`

use std::collections::BTreeSet;

use chrono::Utc;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    error::AppError,
    models::{
        analytics::{
            DifficultyLevel, GradeDistribution, QuestionAnalytics, QuestionAnalyticsEntry,
            QuizAnalytics, QuizAnalyticsReport,
        },
        attempt::AttemptStatus,
        question::Question,
    },
    services::scoring::{self, ResponseMark, Tally},
};

/// What changed, and therefore which analytics row is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AnalyticsTrigger {
    AttemptChanged { quiz_id: i64 },
    ResponseChanged { question_id: i64 },
}

/// The parts of a stored attempt that quiz analytics look at.
#[derive(Debug, Clone, Copy, PartialEq, FromRow)]
pub struct AttemptMark {
    pub status: AttemptStatus,
    pub score: Option<f64>,
    pub time_taken_seconds: Option<f64>,
}

/// Aggregated quiz figures, without bookkeeping columns.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct QuizStats {
    pub total_attempts: i64,
    pub completed_attempts: i64,
    pub average_score: f64,
    pub highest_score: f64,
    pub lowest_score: f64,
    pub average_completion_time_seconds: Option<f64>,
}

impl From<&QuizAnalytics> for QuizStats {
    fn from(row: &QuizAnalytics) -> Self {
        QuizStats {
            total_attempts: row.total_attempts,
            completed_attempts: row.completed_attempts,
            average_score: row.average_score,
            highest_score: row.highest_score,
            lowest_score: row.lowest_score,
            average_completion_time_seconds: row.average_completion_time_seconds,
        }
    }
}

impl QuizStats {
    /// Rebuilds the figures from every attempt of a quiz.
    ///
    /// Counts always follow the attempts. Score and time figures are only
    /// replaced when there is something to compute them from; otherwise the
    /// previous values are kept.
    pub fn recompute(previous: &QuizStats, attempts: &[AttemptMark]) -> QuizStats {
        let completed: Vec<&AttemptMark> = attempts
            .iter()
            .filter(|a| a.status == AttemptStatus::Completed)
            .collect();

        let mut stats = QuizStats {
            total_attempts: attempts.len() as i64,
            completed_attempts: completed.len() as i64,
            ..*previous
        };

        if completed.is_empty() {
            return stats;
        }

        let scores: Vec<f64> = completed.iter().map(|a| a.score.unwrap_or(0.0)).collect();
        stats.average_score = scores.iter().sum::<f64>() / scores.len() as f64;
        stats.highest_score = scores.iter().copied().fold(f64::MIN, f64::max);
        stats.lowest_score = scores.iter().copied().fold(f64::MAX, f64::min);

        let times: Vec<f64> = completed.iter().filter_map(|a| a.time_taken_seconds).collect();
        if let Some(avg) = mean(&times) {
            stats.average_completion_time_seconds = Some(avg);
        }

        stats
    }
}

/// Aggregated question figures, without bookkeeping columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuestionStats {
    pub tally: Tally,
    pub accuracy_percentage: f64,
    pub difficulty_level: DifficultyLevel,
    pub average_time_taken_seconds: Option<f64>,
}

impl QuestionStats {
    /// Rebuilds the figures from every response to a question. A question
    /// nobody answered has 0% accuracy and is therefore rated hard.
    pub fn recompute(previous_average_time: Option<f64>, marks: &[ResponseMark]) -> QuestionStats {
        let tally = Tally::from_marks(marks);
        let accuracy_percentage = tally.percentage();
        let times: Vec<f64> = marks.iter().filter_map(|m| m.time_taken_seconds).collect();

        QuestionStats {
            tally,
            accuracy_percentage,
            difficulty_level: DifficultyLevel::from_accuracy(accuracy_percentage),
            average_time_taken_seconds: mean(&times).or(previous_average_time),
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Share of attempts that were completed, in percent.
pub fn completion_rate(stats: &QuizAnalytics) -> f64 {
    if stats.total_attempts == 0 {
        return 0.0;
    }
    stats.completed_attempts as f64 / stats.total_attempts as f64 * 100.0
}

/// Buckets scores of completed attempts: A from 90, B from 80, C from 70, D from 60.
pub fn grade_distribution(scores: &[f64]) -> GradeDistribution {
    scores
        .iter()
        .fold(GradeDistribution::default(), |mut grades, &score| {
            match score {
                s if s >= 90.0 => grades.a += 1,
                s if s >= 80.0 => grades.b += 1,
                s if s >= 70.0 => grades.c += 1,
                s if s >= 60.0 => grades.d += 1,
                _ => grades.f += 1,
            }
            grades
        })
}

/// Recomputes whatever analytics row `trigger` points at.
pub async fn dispatch(
    conn: &mut SqliteConnection,
    trigger: AnalyticsTrigger,
) -> Result<(), AppError> {
    tracing::debug!("Analytics recompute: {:?}", trigger);
    match trigger {
        AnalyticsTrigger::AttemptChanged { quiz_id } => {
            recompute_quiz(conn, quiz_id).await?;
        }
        AnalyticsTrigger::ResponseChanged { question_id } => {
            recompute_question(conn, question_id).await?;
        }
    }
    Ok(())
}

/// Dispatches a batch of triggers, each distinct trigger once.
pub async fn dispatch_all<I>(conn: &mut SqliteConnection, triggers: I) -> Result<(), AppError>
where
    I: IntoIterator<Item = AnalyticsTrigger>,
{
    let unique: BTreeSet<AnalyticsTrigger> = triggers.into_iter().collect();
    for trigger in unique {
        dispatch(conn, trigger).await?;
    }
    Ok(())
}

/// Rebuilds the analytics row of a quiz, creating it on first use.
pub async fn recompute_quiz(
    conn: &mut SqliteConnection,
    quiz_id: i64,
) -> Result<QuizAnalytics, AppError> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM quizzes WHERE id = ?")
        .bind(quiz_id)
        .fetch_optional(&mut *conn)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    let previous = sqlx::query_as::<_, QuizAnalytics>("SELECT * FROM quiz_analytics WHERE quiz_id = ?")
        .bind(quiz_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| QuizStats::from(&row))
        .unwrap_or_default();

    let attempts = sqlx::query_as::<_, AttemptMark>(
        "SELECT status, score, time_taken_seconds FROM quiz_attempts WHERE quiz_id = ?",
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await?;

    let stats = QuizStats::recompute(&previous, &attempts);
    let now = Utc::now();

    let row = sqlx::query_as::<_, QuizAnalytics>(
        r#"
        INSERT INTO quiz_analytics (
            quiz_id, total_attempts, completed_attempts, average_score,
            highest_score, lowest_score, average_completion_time_seconds,
            created_at, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
        ON CONFLICT(quiz_id) DO UPDATE SET
            total_attempts = excluded.total_attempts,
            completed_attempts = excluded.completed_attempts,
            average_score = excluded.average_score,
            highest_score = excluded.highest_score,
            lowest_score = excluded.lowest_score,
            average_completion_time_seconds = excluded.average_completion_time_seconds,
            updated_at = excluded.updated_at
        RETURNING *
        "#,
    )
    .bind(quiz_id)
    .bind(stats.total_attempts)
    .bind(stats.completed_attempts)
    .bind(stats.average_score)
    .bind(stats.highest_score)
    .bind(stats.lowest_score)
    .bind(stats.average_completion_time_seconds)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        tracing::error!("Failed to store analytics of quiz {}: {:?}", quiz_id, e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(row)
}

/// Rebuilds the analytics row of a question, creating it on first use.
pub async fn recompute_question(
    conn: &mut SqliteConnection,
    question_id: i64,
) -> Result<QuestionAnalytics, AppError> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM questions WHERE id = ?")
        .bind(question_id)
        .fetch_optional(&mut *conn)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    let previous_average_time = sqlx::query_scalar::<_, Option<f64>>(
        "SELECT average_time_taken_seconds FROM question_analytics WHERE question_id = ?",
    )
    .bind(question_id)
    .fetch_optional(&mut *conn)
    .await?
    .flatten();

    let marks = scoring::load_question_marks(conn, question_id).await?;
    let stats = QuestionStats::recompute(previous_average_time, &marks);
    let now = Utc::now();

    let row = sqlx::query_as::<_, QuestionAnalytics>(
        r#"
        INSERT INTO question_analytics (
            question_id, total_responses, correct_responses, wrong_responses,
            unanswered_count, accuracy_percentage, difficulty_level,
            average_time_taken_seconds, created_at, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
        ON CONFLICT(question_id) DO UPDATE SET
            total_responses = excluded.total_responses,
            correct_responses = excluded.correct_responses,
            wrong_responses = excluded.wrong_responses,
            unanswered_count = excluded.unanswered_count,
            accuracy_percentage = excluded.accuracy_percentage,
            difficulty_level = excluded.difficulty_level,
            average_time_taken_seconds = excluded.average_time_taken_seconds,
            updated_at = excluded.updated_at
        RETURNING *
        "#,
    )
    .bind(question_id)
    .bind(stats.tally.total)
    .bind(stats.tally.correct)
    .bind(stats.tally.wrong)
    .bind(stats.tally.unanswered)
    .bind(stats.accuracy_percentage)
    .bind(stats.difficulty_level)
    .bind(stats.average_time_taken_seconds)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        tracing::error!("Failed to store analytics of question {}: {:?}", question_id, e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(row)
}

/// Builds the teacher report for a quiz. Missing analytics rows are created on
/// the way, so a quiz nobody has touched yet still gets a full report.
pub async fn quiz_report(
    conn: &mut SqliteConnection,
    quiz_id: i64,
) -> Result<QuizAnalyticsReport, AppError> {
    let existing = sqlx::query_as::<_, QuizAnalytics>("SELECT * FROM quiz_analytics WHERE quiz_id = ?")
        .bind(quiz_id)
        .fetch_optional(&mut *conn)
        .await?;
    let analytics = match existing {
        Some(row) => row,
        None => recompute_quiz(conn, quiz_id).await?,
    };

    let scores: Vec<f64> = sqlx::query_scalar(
        "SELECT COALESCE(score, 0.0) FROM quiz_attempts WHERE quiz_id = ? AND status = 'completed'",
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await?;

    let questions = sqlx::query_as::<_, Question>(
        "SELECT id, quiz_id, text FROM questions WHERE quiz_id = ? ORDER BY id",
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut entries = Vec::with_capacity(questions.len());
    for question in questions {
        let existing = sqlx::query_as::<_, QuestionAnalytics>(
            "SELECT * FROM question_analytics WHERE question_id = ?",
        )
        .bind(question.id)
        .fetch_optional(&mut *conn)
        .await?;
        let row = match existing {
            Some(row) => row,
            None => recompute_question(conn, question.id).await?,
        };
        entries.push(QuestionAnalyticsEntry {
            question_id: question.id,
            text: question.text,
            analytics: row,
        });
    }

    Ok(QuizAnalyticsReport {
        completion_rate: completion_rate(&analytics),
        grade_distribution: grade_distribution(&scores),
        analytics,
        questions: entries,
    })
}
