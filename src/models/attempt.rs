// src/models/attempt.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

use crate::models::question::PublicQuestion;

/// Selected option per question id.
pub type AnswerMap = BTreeMap<i64, i32>;

/// Represents the 'quiz_attempts' table.
/// One immutable row per completed run through a quiz.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Attempt {
    pub id: Uuid,
    pub quiz_id: i64,
    pub student_id: i64,
    pub answers: Json<AnswerMap>,
    /// 0..=100, rounded percentage of correct answers.
    pub score: i32,
    pub correct_count: i32,
    pub total_questions: i32,
    pub passed: bool,
    pub elapsed_seconds: i32,
    /// 1-based, sequential per (quiz, student).
    pub attempt_number: i32,
    pub submitted_at: DateTime<Utc>,
}

/// A graded attempt that has not been numbered or stored yet.
/// Kept by the engine so a failed write can be retried verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct GradedAttempt {
    pub id: Uuid,
    pub quiz_id: i64,
    pub student_id: i64,
    pub answers: AnswerMap,
    pub score: i32,
    pub correct_count: i32,
    pub total_questions: i32,
    pub passed: bool,
    pub elapsed_seconds: i32,
    pub submitted_at: DateTime<Utc>,
}

impl GradedAttempt {
    pub fn into_attempt(self, attempt_number: i32) -> Attempt {
        Attempt {
            id: self.id,
            quiz_id: self.quiz_id,
            student_id: self.student_id,
            answers: Json(self.answers),
            score: self.score,
            correct_count: self.correct_count,
            total_questions: self.total_questions,
            passed: self.passed,
            elapsed_seconds: self.elapsed_seconds,
            attempt_number,
            submitted_at: self.submitted_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPhase {
    NotStarted,
    InProgress,
    Submitted,
}

/// State of a live attempt as returned to the student.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptView {
    pub quiz_id: i64,
    pub title: String,
    pub time_limit_minutes: i32,
    pub passing_score: i32,
    pub phase: AttemptPhase,
    pub questions: Vec<PublicQuestion>,
    pub answers: AnswerMap,
    pub remaining_seconds: i64,
    pub attempt_number: i32,
    /// Present once the attempt has been stored.
    pub result: Option<Attempt>,
}

/// DTO for recording one answer.
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question_id: i64,
    pub option_index: i32,
}

/// A student's history on one quiz.
#[derive(Debug, Serialize)]
pub struct AttemptHistory {
    pub quiz_id: i64,
    pub attempt_count: usize,
    pub best_score: Option<i32>,
    pub passed_ever: bool,
    /// Newest first.
    pub attempts: Vec<Attempt>,
}

impl AttemptHistory {
    pub fn from_attempts(quiz_id: i64, mut attempts: Vec<Attempt>) -> Self {
        attempts.sort_by(|a, b| b.attempt_number.cmp(&a.attempt_number));
        AttemptHistory {
            quiz_id,
            attempt_count: attempts.len(),
            best_score: attempts.iter().map(|a| a.score).max(),
            passed_ever: attempts.iter().any(|a| a.passed),
            attempts,
        }
    }
}

/// Admin quiz-results row, joined with student and quiz.
#[derive(Debug, Serialize, FromRow)]
pub struct QuizResultEntry {
    pub id: Uuid,
    pub quiz_id: i64,
    pub quiz_title: String,
    pub student_id: i64,
    pub student_email: String,
    pub student_name: Option<String>,
    pub score: i32,
    pub passing_score: i32,
    pub passed: bool,
    pub attempt_number: i32,
    pub elapsed_seconds: i32,
    pub submitted_at: DateTime<Utc>,
}

/// Query parameters for the admin quiz-results listing.
#[derive(Debug, Deserialize)]
pub struct QuizResultParams {
    pub quiz_id: Option<i64>,
    pub student_id: Option<i64>,
    pub limit: Option<i64>,
}
