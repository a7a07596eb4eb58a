// src/models/subject.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'subjects' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    /// Price in the smallest currency unit.
    pub fee: i64,
    pub is_active: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Everything a student sees when opening a granted subject.
#[derive(Debug, Serialize)]
pub struct SubjectDetail {
    pub subject: Subject,
    pub videos: Vec<crate::models::video::Video>,
    pub quizzes: Vec<crate::models::quiz::StudentQuizSummary>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubjectRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub fee: i64,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSubjectRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub fee: Option<i64>,
    pub is_active: Option<bool>,
}
