// src/handlers/students.rs

//! Admin views of students: accounts, subject access and quiz results.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppError,
    models::{
        access::{GrantAccessRequest, SubjectAccess},
        attempt::{QuizResultEntry, QuizResultParams},
        user::{Profile, StudentSummary, UpdateStudentRequest},
    },
    store::Store,
};

const DEFAULT_RESULT_LIMIT: i64 = 100;
const MAX_RESULT_LIMIT: i64 = 500;

/// Students with the ids of the subjects they can open.
pub async fn list_students(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let profiles = sqlx::query_as::<_, Profile>(
        r#"
        SELECT id, email, full_name, phone, role, is_approved, is_active, created_at
        FROM users
        WHERE role = 'student'
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let grants = sqlx::query_as::<_, SubjectAccess>(
        "SELECT student_id, subject_id, granted_at FROM student_subject_access ORDER BY subject_id",
    )
    .fetch_all(&pool)
    .await?;

    let mut by_student: HashMap<i64, Vec<i64>> = HashMap::new();
    for grant in grants {
        by_student
            .entry(grant.student_id)
            .or_default()
            .push(grant.subject_id);
    }

    let students: Vec<StudentSummary> = profiles
        .into_iter()
        .map(|profile| StudentSummary {
            subject_ids: by_student.remove(&profile.id).unwrap_or_default(),
            profile,
        })
        .collect();

    Ok(Json(students))
}

/// Sets `is_approved` and/or `is_active` on a student account.
pub async fn update_student(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateStudentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.is_approved.is_none() && payload.is_active.is_none() {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");

    if let Some(is_approved) = payload.is_approved {
        separated.push("is_approved = ");
        separated.push_bind_unseparated(is_approved);
    }
    if let Some(is_active) = payload.is_active {
        separated.push("is_active = ");
        separated.push_bind_unseparated(is_active);
    }

    builder.push(" WHERE role = 'student' AND id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update student: {:?}", e);
        AppError::from(e)
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Student not found".to_string()));
    }

    tracing::info!(
        student_id = id,
        is_approved = ?payload.is_approved,
        is_active = ?payload.is_active,
        "Student updated"
    );
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct AccessListParams {
    pub student_id: i64,
}

pub async fn list_access(
    State(store): State<Arc<dyn Store>>,
    Query(params): Query<AccessListParams>,
) -> Result<impl IntoResponse, AppError> {
    let grants = store.list_grants(params.student_id).await?;
    Ok(Json(grants))
}

/// Grants a subject directly, without a payment. Granting twice is a no-op.
pub async fn grant_access(
    State(pool): State<PgPool>,
    State(store): State<Arc<dyn Store>>,
    Json(payload): Json<GrantAccessRequest>,
) -> Result<impl IntoResponse, AppError> {
    let is_student: Option<bool> =
        sqlx::query_scalar("SELECT role = 'student' FROM users WHERE id = $1")
            .bind(payload.student_id)
            .fetch_optional(&pool)
            .await?;
    if is_student != Some(true) {
        return Err(AppError::NotFound("Student not found".to_string()));
    }

    let created = store
        .upsert_grant(payload.student_id, payload.subject_id)
        .await?;

    tracing::info!(
        student_id = payload.student_id,
        subject_id = payload.subject_id,
        created,
        "Access granted"
    );

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok(status)
}

pub async fn revoke_access(
    State(store): State<Arc<dyn Store>>,
    Path((student_id, subject_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    if !store.revoke_grant(student_id, subject_id).await? {
        return Err(AppError::NotFound("Access grant not found".to_string()));
    }

    tracing::info!(student_id, subject_id, "Access revoked");
    Ok(StatusCode::NO_CONTENT)
}

/// Recorded attempts across students, newest first.
/// Optional filters: `quiz_id`, `student_id`; `limit` defaults to 100.
pub async fn list_quiz_results(
    State(pool): State<PgPool>,
    Query(params): Query<QuizResultParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_RESULT_LIMIT)
        .clamp(1, MAX_RESULT_LIMIT);

    let results = sqlx::query_as::<_, QuizResultEntry>(
        r#"
        SELECT a.id, a.quiz_id, q.title AS quiz_title,
               a.student_id, u.email AS student_email, u.full_name AS student_name,
               a.score, q.passing_score, a.passed, a.attempt_number,
               a.elapsed_seconds, a.submitted_at
        FROM quiz_attempts a
        JOIN quizzes q ON q.id = a.quiz_id
        JOIN users u ON u.id = a.student_id
        WHERE ($1::BIGINT IS NULL OR a.quiz_id = $1)
          AND ($2::BIGINT IS NULL OR a.student_id = $2)
        ORDER BY a.submitted_at DESC
        LIMIT $3
        "#,
    )
    .bind(params.quiz_id)
    .bind(params.student_id)
    .bind(limit)
    .fetch_all(&pool)
    .await?;

    Ok(Json(results))
}
