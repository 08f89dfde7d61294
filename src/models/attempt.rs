// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::question::PublicQuestion;

/// Lifecycle of a quiz attempt.
///
/// `started -> in_progress -> completed`, with `abandoned` reachable from any
/// state that is not completed. `completed` and `abandoned` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AttemptStatus {
    Started,
    InProgress,
    Completed,
    Abandoned,
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: AttemptStatus,
    pub to: AttemptStatus,
}

impl AttemptStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptStatus::Completed | AttemptStatus::Abandoned)
    }

    /// Whether answers may still be recorded against the attempt.
    pub fn accepts_responses(&self) -> bool {
        !self.is_terminal()
    }

    /// First access to the questions. Only `started` moves; `in_progress` stays put.
    pub fn begin_answering(self) -> Result<AttemptStatus, InvalidTransition> {
        match self {
            AttemptStatus::Started | AttemptStatus::InProgress => Ok(AttemptStatus::InProgress),
            from => Err(InvalidTransition {
                from,
                to: AttemptStatus::InProgress,
            }),
        }
    }

    pub fn complete(self) -> Result<AttemptStatus, InvalidTransition> {
        match self {
            AttemptStatus::Started | AttemptStatus::InProgress => Ok(AttemptStatus::Completed),
            from => Err(InvalidTransition {
                from,
                to: AttemptStatus::Completed,
            }),
        }
    }

    pub fn abandon(self) -> Result<AttemptStatus, InvalidTransition> {
        match self {
            AttemptStatus::Completed => Err(InvalidTransition {
                from: self,
                to: AttemptStatus::Abandoned,
            }),
            _ => Ok(AttemptStatus::Abandoned),
        }
    }
}

/// Represents the 'quiz_attempts' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub student_id: i64,
    pub quiz_id: i64,
    pub status: AttemptStatus,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,

    /// Percentage of correct answers, set when the attempt is scored.
    pub score: Option<f64>,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub wrong_answers: i64,
    pub unanswered: i64,

    /// `end_time - start_time` in seconds, only for completed attempts.
    pub time_taken_seconds: Option<f64>,
}

/// Represents the 'quiz_responses' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizResponse {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub selected_option_id: Option<i64>,

    /// Derived from the selected option on every save, never set directly.
    pub is_correct: bool,
    pub answered_at: chrono::DateTime<chrono::Utc>,
    pub time_taken_seconds: Option<f64>,
}

/// Attempt listed for its student, with the quiz title joined in.
#[derive(Debug, Serialize, FromRow)]
pub struct AttemptSummary {
    pub id: i64,
    pub quiz_id: i64,
    pub quiz_title: String,
    pub status: AttemptStatus,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub score: Option<f64>,
}

/// How a start request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    /// A new attempt was created.
    Created,
    /// An unfinished attempt already existed and is handed back.
    Resumed,
    /// The quiz was already completed; the caller should look at the results.
    AlreadyCompleted,
}

#[derive(Debug, Serialize)]
pub struct StartAttemptResponse {
    pub outcome: StartOutcome,
    pub attempt: QuizAttempt,
}

/// Questions of an attempt in progress with whatever was answered so far.
#[derive(Debug, Serialize)]
pub struct TakeQuizResponse {
    pub attempt: QuizAttempt,
    pub questions: Vec<PublicQuestion>,
    pub responses: Vec<QuizResponse>,
}

/// DTO for answering one question.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    pub question_id: i64,
    /// `None` records the question as seen but unanswered.
    pub option_id: Option<i64>,
    /// Seconds spent on this question.
    #[validate(range(min = 0.0, message = "time_taken cannot be negative"))]
    pub time_taken: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct AnswerRecorded {
    pub success: bool,
    pub is_correct: bool,
    pub correct_option_id: Option<i64>,
}

/// One answered question in the result view.
#[derive(Debug, Serialize, FromRow)]
pub struct ResponseDetail {
    pub question_id: i64,
    pub question_text: String,
    pub selected_option_id: Option<i64>,
    pub selected_option_text: Option<String>,
    pub is_correct: bool,
    pub time_taken_seconds: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct AttemptResult {
    pub attempt: QuizAttempt,
    pub responses: Vec<ResponseDetail>,
}
