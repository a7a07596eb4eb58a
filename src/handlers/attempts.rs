// src/handlers/attempts.rs

//! Student quiz attempt endpoints. Thin wrappers over `QuizAttempts`.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError, models::attempt::AnswerRequest, services::attempts::QuizAttempts,
    session::Session,
};

/// Opens the quiz: starts a new attempt or resumes the running one.
pub async fn start_attempt(
    State(attempts): State<Arc<QuizAttempts>>,
    session: Session,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let view = attempts.load(&session, quiz_id).await?;
    Ok(Json(view))
}

pub async fn record_answer(
    State(attempts): State<Arc<QuizAttempts>>,
    session: Session,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = attempts.record_answer(&session, quiz_id, &payload).await?;
    Ok(Json(view))
}

/// Submits the running attempt. Repeating the call returns the same record.
pub async fn submit_attempt(
    State(attempts): State<Arc<QuizAttempts>>,
    session: Session,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = attempts.submit(&session, quiz_id).await?;
    Ok(Json(attempt))
}

/// Leaves the quiz. An unsubmitted attempt is discarded.
pub async fn abandon_attempt(
    State(attempts): State<Arc<QuizAttempts>>,
    session: Session,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if attempts.abandon(&session, quiz_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("No attempt in progress for this quiz".to_string()))
    }
}

pub async fn list_attempts(
    State(attempts): State<Arc<QuizAttempts>>,
    session: Session,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let history = attempts.history(&session, quiz_id).await?;
    Ok(Json(history))
}
