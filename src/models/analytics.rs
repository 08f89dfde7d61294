// src/models/analytics.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Difficulty of a question, derived from how often it is answered correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum DifficultyLevel {
    Easy,
    Medium,
    Hard,
}

impl DifficultyLevel {
    /// 80% and up is easy, 50% and up is medium, anything lower is hard.
    /// Both boundaries belong to the easier band.
    pub fn from_accuracy(accuracy_percentage: f64) -> Self {
        if accuracy_percentage >= 80.0 {
            DifficultyLevel::Easy
        } else if accuracy_percentage >= 50.0 {
            DifficultyLevel::Medium
        } else {
            DifficultyLevel::Hard
        }
    }
}

/// Represents the 'quiz_analytics' table. One row per quiz.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAnalytics {
    pub quiz_id: i64,
    pub total_attempts: i64,
    pub completed_attempts: i64,
    pub average_score: f64,
    pub highest_score: f64,
    pub lowest_score: f64,
    pub average_completion_time_seconds: Option<f64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'question_analytics' table. One row per question.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuestionAnalytics {
    pub question_id: i64,
    pub total_responses: i64,
    pub correct_responses: i64,
    pub wrong_responses: i64,
    pub unanswered_count: i64,
    pub accuracy_percentage: f64,
    pub difficulty_level: DifficultyLevel,
    pub average_time_taken_seconds: Option<f64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Completed attempts bucketed by score.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct GradeDistribution {
    pub a: i64,
    pub b: i64,
    pub c: i64,
    pub d: i64,
    pub f: i64,
}

#[derive(Debug, Serialize)]
pub struct QuestionAnalyticsEntry {
    pub question_id: i64,
    pub text: String,
    pub analytics: QuestionAnalytics,
}

/// Everything a teacher sees about one quiz.
#[derive(Debug, Serialize)]
pub struct QuizAnalyticsReport {
    pub analytics: QuizAnalytics,
    pub completion_rate: f64,
    pub grade_distribution: GradeDistribution,
    pub questions: Vec<QuestionAnalyticsEntry>,
}
