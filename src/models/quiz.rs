// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::config::MAX_TIME_LIMIT_MINUTES;

/// Represents the 'quizzes' table.
/// Read-only input to the attempt engine.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Quiz {
    pub id: i64,
    pub subject_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub time_limit_minutes: i32,
    /// Percentage an attempt must meet or exceed to pass.
    pub passing_score: i32,
    pub is_active: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Quiz {
    pub fn time_limit_seconds(&self) -> i64 {
        i64::from(self.time_limit_minutes) * 60
    }
}

/// A quiz as listed on a student's subject page.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StudentQuizSummary {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub time_limit_minutes: i32,
    pub passing_score: i32,
    pub question_count: i64,
    pub attempt_count: i64,
    pub best_score: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    pub subject_id: i64,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = MAX_TIME_LIMIT_MINUTES))]
    pub time_limit_minutes: i32,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: i32,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = MAX_TIME_LIMIT_MINUTES))]
    pub time_limit_minutes: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,
    pub is_active: Option<bool>,
}
