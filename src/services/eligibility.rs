// src/services/eligibility.rs

use std::fmt;

use sqlx::SqliteConnection;

use crate::{
    error::AppError,
    models::{
        profile::{Degree, Profile},
        quiz::Quiz,
        user::UserRole,
    },
};

/// Why a user may not attempt a quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ineligibility {
    NotStudent,
    MissingProfile,
    DegreeMismatch { required: Degree, actual: Degree },
    SemesterMismatch { required: String, actual: i64 },
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ineligibility::NotStudent => f.write_str("Only students can attempt quizzes."),
            Ineligibility::MissingProfile => {
                f.write_str("Please complete your profile to attempt quizzes.")
            }
            Ineligibility::DegreeMismatch { required, actual } => write!(
                f,
                "This quiz is for {} students; your degree is {}.",
                required, actual
            ),
            Ineligibility::SemesterMismatch { required, actual } => write!(
                f,
                "This quiz is for semester {}; you are in semester {}.",
                required, actual
            ),
        }
    }
}

/// Decides whether a user may attempt `quiz`.
///
/// A restriction only applies when both the quiz and the profile carry a value
/// for it: an unset degree or semester on either side lets the student through.
pub fn check(
    role: UserRole,
    profile: Option<&Profile>,
    quiz: &Quiz,
) -> Result<(), Ineligibility> {
    if role != UserRole::Student {
        return Err(Ineligibility::NotStudent);
    }

    let profile = profile.ok_or(Ineligibility::MissingProfile)?;

    if let (Some(required), Some(actual)) = (quiz.intent_degree, profile.degree) {
        if required != actual {
            return Err(Ineligibility::DegreeMismatch { required, actual });
        }
    }

    if let (Some(required), Some(actual)) = (&quiz.intent_semester, profile.current_semester) {
        if actual.to_string() != *required {
            return Err(Ineligibility::SemesterMismatch {
                required: required.clone(),
                actual,
            });
        }
    }

    Ok(())
}

/// Loads the role and profile of `user_id`.
pub async fn load_candidate(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<(UserRole, Option<Profile>), AppError> {
    let role: UserRole = sqlx::query_scalar("SELECT role FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok((role, profile))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz(degree: Option<Degree>, semester: Option<&str>) -> Quiz {
        Quiz {
            id: 1,
            title: "Data Structures".to_string(),
            description: String::new(),
            created_by: 1,
            intent_degree: degree,
            intent_semester: semester.map(str::to_string),
            created_at: None,
        }
    }

    fn profile(degree: Option<Degree>, semester: Option<i64>) -> Profile {
        Profile {
            user_id: 2,
            degree,
            current_semester: semester,
            student_id: None,
            institution: None,
            subject_specialization: None,
            bio: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_matching_degree_and_semester() {
        let q = quiz(Some(Degree::Btech), Some("3"));
        let p = profile(Some(Degree::Btech), Some(3));
        assert_eq!(check(UserRole::Student, Some(&p), &q), Ok(()));
    }

    #[test]
    fn test_semester_mismatch() {
        let q = quiz(Some(Degree::Btech), Some("3"));
        let p = profile(Some(Degree::Btech), Some(4));
        assert_eq!(
            check(UserRole::Student, Some(&p), &q),
            Err(Ineligibility::SemesterMismatch {
                required: "3".to_string(),
                actual: 4
            })
        );
    }

    #[test]
    fn test_degree_mismatch() {
        let q = quiz(Some(Degree::Mtech), None);
        let p = profile(Some(Degree::Btech), Some(1));
        assert!(matches!(
            check(UserRole::Student, Some(&p), &q),
            Err(Ineligibility::DegreeMismatch { .. })
        ));
    }

    #[test]
    fn test_teacher_is_never_eligible() {
        let q = quiz(None, None);
        let p = profile(None, None);
        assert_eq!(
            check(UserRole::Teacher, Some(&p), &q),
            Err(Ineligibility::NotStudent)
        );
    }

    #[test]
    fn test_missing_profile() {
        let q = quiz(None, None);
        assert_eq!(
            check(UserRole::Student, None, &q),
            Err(Ineligibility::MissingProfile)
        );
    }

    #[test]
    fn test_unset_constraints_are_permissive() {
        // Unrestricted quiz.
        let p = profile(Some(Degree::Mtech), Some(2));
        assert_eq!(check(UserRole::Student, Some(&p), &quiz(None, None)), Ok(()));

        // Restricted quiz, but the profile leaves degree and semester blank.
        let blank = profile(None, None);
        let q = quiz(Some(Degree::Btech), Some("5"));
        assert_eq!(check(UserRole::Student, Some(&blank), &q), Ok(()));
    }
}
