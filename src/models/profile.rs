// src/models/profile.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Degree programmes quizzes can be targeted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Degree {
    /// Four years, eight semesters.
    Btech,
    /// Two years, four semesters.
    Mtech,
}

impl Degree {
    pub fn semester_count(&self) -> i64 {
        match self {
            Degree::Btech => 8,
            Degree::Mtech => 4,
        }
    }
}

impl fmt::Display for Degree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degree::Btech => f.write_str("btech"),
            Degree::Mtech => f.write_str("mtech"),
        }
    }
}

/// Represents the 'profiles' table. One row per user at most.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Profile {
    #[serde(skip)]
    pub user_id: i64,
    pub degree: Option<Degree>,
    pub current_semester: Option<i64>,
    pub student_id: Option<String>,
    pub institution: Option<String>,
    pub subject_specialization: Option<String>,
    pub bio: Option<String>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating or replacing the caller's profile.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    pub degree: Option<Degree>,
    #[validate(range(min = 1, max = 8, message = "Semester must be between 1 and 8."))]
    pub current_semester: Option<i64>,
    #[validate(length(max = 20))]
    pub student_id: Option<String>,
    #[validate(length(max = 200))]
    pub institution: Option<String>,
    #[validate(length(max = 100))]
    pub subject_specialization: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
}

impl UpdateProfileRequest {
    /// The semester must exist in the chosen degree programme.
    pub fn check_semester(&self) -> Result<(), String> {
        match (self.degree, self.current_semester) {
            (Some(degree), Some(semester)) if semester > degree.semester_count() => Err(format!(
                "{} has only {} semesters",
                degree,
                degree.semester_count()
            )),
            _ => Ok(()),
        }
    }
}
