// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

use crate::error::AppError;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 6;
const MAX_TEXT_LEN: usize = 2000;
const MAX_OPTION_LEN: usize = 500;

/// Represents the 'quiz_questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: i64,

    pub quiz_id: i64,

    /// The prompt shown to the student.
    pub question_text: String,

    /// Ordered list of options, stored as a JSON array.
    pub options: Json<Vec<String>>,

    /// Index into `options`.
    pub correct_answer: i32,

    /// Display order within the quiz. Ties are broken by id.
    pub sort_order: i32,
}

impl Question {
    /// True when `option` is a valid selection for this question.
    pub fn accepts(&self, option: i32) -> bool {
        option >= 0 && (option as usize) < self.options.len()
    }
}

/// DTO for sending a question to the student (excludes the answer).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub question_text: String,
    pub options: Vec<String>,
    pub sort_order: i32,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        PublicQuestion {
            id: q.id,
            question_text: q.question_text.clone(),
            options: q.options.0.clone(),
            sort_order: q.sort_order,
        }
    }
}

/// Question payload accepted from admins.
///
/// The canonical shape is an option array plus an integer index. The older
/// four-field shape with a letter code (`"A"`..`"D"`) is still accepted and
/// converted by [`QuestionInput::normalize`].
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum QuestionInput {
    Indexed {
        question_text: String,
        options: Vec<String>,
        correct_answer: i32,
        sort_order: Option<i32>,
    },
    Lettered {
        question_text: String,
        option_a: String,
        option_b: String,
        option_c: String,
        option_d: String,
        correct_answer: String,
        sort_order: Option<i32>,
    },
}

/// A validated question in canonical form, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQuestion {
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer: i32,
    pub sort_order: Option<i32>,
}

impl QuestionInput {
    pub fn normalize(self) -> Result<NewQuestion, AppError> {
        let question = match self {
            QuestionInput::Indexed {
                question_text,
                options,
                correct_answer,
                sort_order,
            } => NewQuestion {
                question_text,
                options,
                correct_answer,
                sort_order,
            },
            QuestionInput::Lettered {
                question_text,
                option_a,
                option_b,
                option_c,
                option_d,
                correct_answer,
                sort_order,
            } => NewQuestion {
                question_text,
                options: vec![option_a, option_b, option_c, option_d],
                correct_answer: letter_to_index(&correct_answer)?,
                sort_order,
            },
        };
        question.validate()?;
        Ok(question)
    }
}

impl NewQuestion {
    fn validate(&self) -> Result<(), AppError> {
        let text = self.question_text.trim();
        if text.is_empty() || text.len() > MAX_TEXT_LEN {
            return Err(AppError::BadRequest(
                "question_text must be between 1 and 2000 characters".to_string(),
            ));
        }
        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&self.options.len()) {
            return Err(AppError::BadRequest(format!(
                "a question needs between {} and {} options",
                MIN_OPTIONS, MAX_OPTIONS
            )));
        }
        if self
            .options
            .iter()
            .any(|o| o.trim().is_empty() || o.len() > MAX_OPTION_LEN)
        {
            return Err(AppError::BadRequest(
                "options must be non-empty and at most 500 characters".to_string(),
            ));
        }
        if self.correct_answer < 0 || self.correct_answer as usize >= self.options.len() {
            return Err(AppError::BadRequest(
                "correct_answer must index into options".to_string(),
            ));
        }
        Ok(())
    }
}

fn letter_to_index(letter: &str) -> Result<i32, AppError> {
    match letter.trim().to_ascii_uppercase().as_str() {
        "A" => Ok(0),
        "B" => Ok(1),
        "C" => Ok(2),
        "D" => Ok(3),
        other => Err(AppError::BadRequest(format!(
            "correct_answer '{}' is not one of A, B, C, D",
            other
        ))),
    }
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateQuestionRequest {
    pub question_text: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<i32>,
    pub sort_order: Option<i32>,
}

impl UpdateQuestionRequest {
    /// Applies the patch to `current` and re-validates the result,
    /// so an update can never leave `correct_answer` out of range.
    pub fn apply(self, current: &Question) -> Result<NewQuestion, AppError> {
        let merged = NewQuestion {
            question_text: self
                .question_text
                .unwrap_or_else(|| current.question_text.clone()),
            options: self.options.unwrap_or_else(|| current.options.0.clone()),
            correct_answer: self.correct_answer.unwrap_or(current.correct_answer),
            sort_order: Some(self.sort_order.unwrap_or(current.sort_order)),
        };
        merged.validate()?;
        Ok(merged)
    }
}
