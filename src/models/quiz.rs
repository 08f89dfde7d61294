// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::{
    attempt::AttemptStatus,
    profile::Degree,
    question::{CreateQuestionRequest, PublicQuestion, QuestionWithOptions},
};

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub created_by: i64,

    /// Degree the quiz is meant for. `None` means any degree.
    pub intent_degree: Option<Degree>,

    /// Semester the quiz is meant for, as text ("3"). `None` means any semester.
    pub intent_semester: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Quiz with every question and option, as seen by its owner.
#[derive(Debug, Serialize)]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<QuestionWithOptions>,
}

/// Quiz as a student sees it before taking it: no correct flags.
#[derive(Debug, Serialize)]
pub struct PublicQuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<PublicQuestion>,
}

/// A quiz the current student may take, with the state of their attempt.
#[derive(Debug, Serialize)]
pub struct EligibleQuiz {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub question_count: i64,
    pub attempt_id: Option<i64>,
    pub attempt_status: Option<AttemptStatus>,
}

/// DTO for creating a quiz, optionally with its questions.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: String,
    pub intent_degree: Option<Degree>,
    #[validate(custom(function = validate_semester))]
    pub intent_semester: Option<String>,
    #[validate(nested)]
    #[serde(default)]
    pub questions: Vec<CreateQuestionRequest>,
}

/// DTO for updating quiz metadata. Absent fields are left untouched.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub intent_degree: Option<Degree>,
    #[validate(custom(function = validate_semester))]
    pub intent_semester: Option<String>,
    /// Set to true to lift the degree/semester restriction entirely.
    #[serde(default)]
    pub clear_intent: bool,
}

fn validate_semester(semester: &str) -> Result<(), validator::ValidationError> {
    match semester.parse::<u8>() {
        Ok(1..=8) => Ok(()),
        _ => Err(validator::ValidationError::new("semester_out_of_range")),
    }
}
