// src/handlers/subjects.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        quiz::StudentQuizSummary,
        subject::{Subject, SubjectDetail},
        video::Video,
    },
    services::access,
    session::Session,
    store::Store,
};

pub(crate) const SUBJECT_COLUMNS: &str = "id, title, description, fee, is_active, created_at";

/// Active subjects the student has been granted.
pub async fn list_my_subjects(
    State(pool): State<PgPool>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let subjects = sqlx::query_as::<_, Subject>(
        r#"
        SELECT s.id, s.title, s.description, s.fee, s.is_active, s.created_at
        FROM subjects s
        JOIN student_subject_access a ON a.subject_id = s.id
        WHERE a.student_id = $1 AND s.is_active = TRUE
        ORDER BY s.title
        "#,
    )
    .bind(session.user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(subjects))
}

/// Active subjects the student can still buy.
pub async fn list_available_subjects(
    State(pool): State<PgPool>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let subjects = sqlx::query_as::<_, Subject>(
        r#"
        SELECT s.id, s.title, s.description, s.fee, s.is_active, s.created_at
        FROM subjects s
        WHERE s.is_active = TRUE
          AND NOT EXISTS (
              SELECT 1 FROM student_subject_access a
              WHERE a.subject_id = s.id AND a.student_id = $1
          )
        ORDER BY s.title
        "#,
    )
    .bind(session.user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(subjects))
}

/// Subject page: active videos and quizzes with the caller's best scores.
/// Requires a grant (admins bypass).
pub async fn get_subject(
    State(pool): State<PgPool>,
    State(store): State<Arc<dyn Store>>,
    session: Session,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    access::require_access(store.as_ref(), &session, id).await?;

    let sql = format!(
        "SELECT {} FROM subjects WHERE id = $1 AND (is_active = TRUE OR $2)",
        SUBJECT_COLUMNS
    );
    let subject = sqlx::query_as::<_, Subject>(&sql)
        .bind(id)
        .bind(session.is_admin())
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Subject not found".to_string()))?;

    let videos = sqlx::query_as::<_, Video>(
        r#"
        SELECT id, subject_id, title, description, video_url, sort_order, is_active, created_at
        FROM videos
        WHERE subject_id = $1 AND is_active = TRUE
        ORDER BY sort_order, id
        "#,
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    let quizzes = sqlx::query_as::<_, StudentQuizSummary>(
        r#"
        SELECT q.id, q.title, q.description, q.time_limit_minutes, q.passing_score,
               (SELECT COUNT(*) FROM quiz_questions qq WHERE qq.quiz_id = q.id) AS question_count,
               (SELECT COUNT(*) FROM quiz_attempts qa
                 WHERE qa.quiz_id = q.id AND qa.student_id = $2) AS attempt_count,
               (SELECT MAX(qa.score) FROM quiz_attempts qa
                 WHERE qa.quiz_id = q.id AND qa.student_id = $2) AS best_score
        FROM quizzes q
        WHERE q.subject_id = $1 AND q.is_active = TRUE
        ORDER BY q.created_at, q.id
        "#,
    )
    .bind(id)
    .bind(session.user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(SubjectDetail {
        subject,
        videos,
        quizzes,
    }))
}
