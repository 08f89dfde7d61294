// src/services/quiz.rs

use std::collections::HashMap;

use sqlx::SqliteConnection;

use crate::{
    error::AppError,
    models::{
        question::{CreateQuestionRequest, Question, QuestionOption, QuestionWithOptions},
        quiz::Quiz,
    },
    utils::html::clean_html,
};

pub async fn find_quiz(conn: &mut SqliteConnection, quiz_id: i64) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = ?")
        .bind(quiz_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))
}

/// Every question of a quiz with its options, ordered by id.
pub async fn questions_with_options(
    conn: &mut SqliteConnection,
    quiz_id: i64,
) -> Result<Vec<QuestionWithOptions>, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        "SELECT id, quiz_id, text FROM questions WHERE quiz_id = ? ORDER BY id",
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await?;

    let options = sqlx::query_as::<_, QuestionOption>(
        r#"
        SELECT o.id, o.question_id, o.text, o.is_correct
        FROM options o
        JOIN questions q ON q.id = o.question_id
        WHERE q.quiz_id = ?
        ORDER BY o.id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_question: HashMap<i64, Vec<QuestionOption>> = HashMap::new();
    for option in options {
        by_question.entry(option.question_id).or_default().push(option);
    }

    Ok(questions
        .into_iter()
        .map(|question| QuestionWithOptions {
            options: by_question.remove(&question.id).unwrap_or_default(),
            question,
        })
        .collect())
}

/// Inserts a question and its options. Text is sanitized before it is stored.
pub async fn insert_question(
    conn: &mut SqliteConnection,
    quiz_id: i64,
    req: &CreateQuestionRequest,
) -> Result<QuestionWithOptions, AppError> {
    let question = sqlx::query_as::<_, Question>(
        "INSERT INTO questions (quiz_id, text) VALUES (?, ?) RETURNING id, quiz_id, text",
    )
    .bind(quiz_id)
    .bind(clean_html(&req.text))
    .fetch_one(&mut *conn)
    .await?;

    let mut options = Vec::with_capacity(req.options.len());
    for option in &req.options {
        let row = sqlx::query_as::<_, QuestionOption>(
            r#"
            INSERT INTO options (question_id, text, is_correct)
            VALUES (?, ?, ?)
            RETURNING id, question_id, text, is_correct
            "#,
        )
        .bind(question.id)
        .bind(clean_html(&option.text))
        .bind(option.is_correct)
        .fetch_one(&mut *conn)
        .await?;
        options.push(row);
    }

    Ok(QuestionWithOptions { question, options })
}

/// A question of `quiz_id`; questions of other quizzes count as missing.
pub async fn find_question_in_quiz(
    conn: &mut SqliteConnection,
    quiz_id: i64,
    question_id: i64,
) -> Result<Question, AppError> {
    sqlx::query_as::<_, Question>(
        "SELECT id, quiz_id, text FROM questions WHERE id = ? AND quiz_id = ?",
    )
    .bind(question_id)
    .bind(quiz_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Question not found in this quiz".to_string()))
}

/// An option of `question_id`; options of other questions count as missing.
pub async fn find_option_of_question(
    conn: &mut SqliteConnection,
    question_id: i64,
    option_id: i64,
) -> Result<QuestionOption, AppError> {
    sqlx::query_as::<_, QuestionOption>(
        "SELECT id, question_id, text, is_correct FROM options WHERE id = ? AND question_id = ?",
    )
    .bind(option_id)
    .bind(question_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Option not found for this question".to_string()))
}

pub async fn first_correct_option(
    conn: &mut SqliteConnection,
    question_id: i64,
) -> Result<Option<i64>, AppError> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM options WHERE question_id = ? AND is_correct = TRUE ORDER BY id LIMIT 1",
    )
    .bind(question_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(id)
}
