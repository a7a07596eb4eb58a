// src/handlers/admin.rs

//! Admin content management: subjects, videos, quizzes and questions.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::subjects::SUBJECT_COLUMNS,
    models::{
        question::{Question, QuestionInput, UpdateQuestionRequest},
        quiz::{CreateQuizRequest, Quiz, UpdateQuizRequest},
        subject::{CreateSubjectRequest, Subject, UpdateSubjectRequest},
        video::{CreateVideoRequest, UpdateVideoRequest, Video},
    },
    utils::html::{clean_html, clean_optional},
};

const VIDEO_COLUMNS: &str =
    "id, subject_id, title, description, video_url, sort_order, is_active, created_at";

const QUIZ_COLUMNS: &str =
    "id, subject_id, title, description, time_limit_minutes, passing_score, is_active, created_at";

const QUESTION_COLUMNS: &str = "id, quiz_id, question_text, options, correct_answer, sort_order";

/// Runs a partial `UPDATE`, or does nothing when no field was set.
/// NotFound when the id matches no row.
async fn execute_update(
    pool: &PgPool,
    mut builder: QueryBuilder<'_, Postgres>,
    has_fields: bool,
    id: i64,
    what: &str,
) -> Result<(), AppError> {
    if !has_fields {
        return Ok(());
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(pool).await.map_err(|e| {
        tracing::error!("Failed to update {}: {:?}", what, e);
        AppError::from(e)
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("{} not found", what)));
    }
    Ok(())
}

async fn delete_by_id(pool: &PgPool, table: &str, id: i64, what: &str) -> Result<(), AppError> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", table))
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| match &e {
            // Recorded attempts hold a RESTRICT reference on their quiz.
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => AppError::Conflict(
                format!("{} has recorded quiz attempts; deactivate it instead", what),
            ),
            _ => {
                tracing::error!("Failed to delete {}: {:?}", what, e);
                AppError::from(e)
            }
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("{} not found", what)));
    }
    Ok(())
}

// ---- Subjects ----

/// Lists all subjects, inactive ones included.
pub async fn list_subjects(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let sql = format!("SELECT {} FROM subjects ORDER BY title, id", SUBJECT_COLUMNS);
    let subjects = sqlx::query_as::<_, Subject>(&sql).fetch_all(&pool).await?;
    Ok(Json(subjects))
}

pub async fn create_subject(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateSubjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let sql = format!(
        "INSERT INTO subjects (title, description, fee, is_active) VALUES ($1, $2, $3, $4) \
         RETURNING {}",
        SUBJECT_COLUMNS
    );
    let subject = sqlx::query_as::<_, Subject>(&sql)
        .bind(clean_html(payload.title.trim()))
        .bind(clean_optional(payload.description.as_deref()))
        .bind(payload.fee)
        .bind(payload.is_active.unwrap_or(true))
        .fetch_one(&pool)
        .await?;

    tracing::info!(subject_id = subject.id, "Subject created");
    Ok((StatusCode::CREATED, Json(subject)))
}

pub async fn update_subject(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateSubjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE subjects SET ");
    let mut separated = builder.separated(", ");
    let mut has_fields = false;

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(clean_html(title.trim()));
        has_fields = true;
    }
    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(clean_optional(Some(description.as_str())));
        has_fields = true;
    }
    if let Some(fee) = payload.fee {
        separated.push("fee = ");
        separated.push_bind_unseparated(fee);
        has_fields = true;
    }
    if let Some(is_active) = payload.is_active {
        separated.push("is_active = ");
        separated.push_bind_unseparated(is_active);
        has_fields = true;
    }

    execute_update(&pool, builder, has_fields, id, "Subject").await?;
    Ok(StatusCode::OK)
}

/// Deletes a subject with its videos, quizzes, grants and payments.
/// Conflict when one of its quizzes has recorded attempts.
pub async fn delete_subject(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    delete_by_id(&pool, "subjects", id, "Subject").await?;
    tracing::info!(subject_id = id, "Subject deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---- Videos ----

/// Videos of a subject in display order, inactive ones included.
pub async fn list_videos(
    State(pool): State<PgPool>,
    Path(subject_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let sql = format!(
        "SELECT {} FROM videos WHERE subject_id = $1 ORDER BY sort_order, id",
        VIDEO_COLUMNS
    );
    let videos = sqlx::query_as::<_, Video>(&sql)
        .bind(subject_id)
        .fetch_all(&pool)
        .await?;
    Ok(Json(videos))
}

pub async fn create_video(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateVideoRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let sql = format!(
        r#"
        INSERT INTO videos (subject_id, title, description, video_url, sort_order, is_active)
        VALUES ($1, $2, $3, $4,
                COALESCE($5, (SELECT COALESCE(MAX(sort_order), -1) + 1
                              FROM videos WHERE subject_id = $1)),
                $6)
        RETURNING {}
        "#,
        VIDEO_COLUMNS
    );
    let video = sqlx::query_as::<_, Video>(&sql)
        .bind(payload.subject_id)
        .bind(clean_html(payload.title.trim()))
        .bind(clean_optional(payload.description.as_deref()))
        .bind(payload.video_url.trim())
        .bind(payload.sort_order)
        .bind(payload.is_active.unwrap_or(true))
        .fetch_one(&pool)
        .await?;

    Ok((StatusCode::CREATED, Json(video)))
}

pub async fn update_video(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateVideoRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE videos SET ");
    let mut separated = builder.separated(", ");
    let mut has_fields = false;

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(clean_html(title.trim()));
        has_fields = true;
    }
    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(clean_optional(Some(description.as_str())));
        has_fields = true;
    }
    if let Some(video_url) = payload.video_url {
        separated.push("video_url = ");
        separated.push_bind_unseparated(video_url.trim().to_string());
        has_fields = true;
    }
    if let Some(sort_order) = payload.sort_order {
        separated.push("sort_order = ");
        separated.push_bind_unseparated(sort_order);
        has_fields = true;
    }
    if let Some(is_active) = payload.is_active {
        separated.push("is_active = ");
        separated.push_bind_unseparated(is_active);
        has_fields = true;
    }

    execute_update(&pool, builder, has_fields, id, "Video").await?;
    Ok(StatusCode::OK)
}

pub async fn delete_video(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    delete_by_id(&pool, "videos", id, "Video").await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- Quizzes ----

pub async fn list_quizzes(
    State(pool): State<PgPool>,
    Path(subject_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let sql = format!(
        "SELECT {} FROM quizzes WHERE subject_id = $1 ORDER BY created_at, id",
        QUIZ_COLUMNS
    );
    let quizzes = sqlx::query_as::<_, Quiz>(&sql)
        .bind(subject_id)
        .fetch_all(&pool)
        .await?;
    Ok(Json(quizzes))
}

pub async fn create_quiz(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let sql = format!(
        r#"
        INSERT INTO quizzes
            (subject_id, title, description, time_limit_minutes, passing_score, is_active)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {}
        "#,
        QUIZ_COLUMNS
    );
    let quiz = sqlx::query_as::<_, Quiz>(&sql)
        .bind(payload.subject_id)
        .bind(clean_html(payload.title.trim()))
        .bind(clean_optional(payload.description.as_deref()))
        .bind(payload.time_limit_minutes)
        .bind(payload.passing_score)
        .bind(payload.is_active.unwrap_or(true))
        .fetch_one(&pool)
        .await?;

    tracing::info!(quiz_id = quiz.id, subject_id = quiz.subject_id, "Quiz created");
    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Updates quiz settings. Running attempts keep the settings they started with.
pub async fn update_quiz(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE quizzes SET ");
    let mut separated = builder.separated(", ");
    let mut has_fields = false;

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(clean_html(title.trim()));
        has_fields = true;
    }
    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(clean_optional(Some(description.as_str())));
        has_fields = true;
    }
    if let Some(minutes) = payload.time_limit_minutes {
        separated.push("time_limit_minutes = ");
        separated.push_bind_unseparated(minutes);
        has_fields = true;
    }
    if let Some(passing_score) = payload.passing_score {
        separated.push("passing_score = ");
        separated.push_bind_unseparated(passing_score);
        has_fields = true;
    }
    if let Some(is_active) = payload.is_active {
        separated.push("is_active = ");
        separated.push_bind_unseparated(is_active);
        has_fields = true;
    }

    execute_update(&pool, builder, has_fields, id, "Quiz").await?;
    Ok(StatusCode::OK)
}

/// Deletes a quiz with its questions. Quizzes with recorded attempts are
/// refused with a conflict; deactivate them instead.
pub async fn delete_quiz(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    delete_by_id(&pool, "quizzes", id, "Quiz").await?;
    tracing::info!(quiz_id = id, "Quiz deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---- Questions ----

/// Questions of a quiz with their correct answers.
pub async fn list_questions(
    State(pool): State<PgPool>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let sql = format!(
        "SELECT {} FROM quiz_questions WHERE quiz_id = $1 ORDER BY sort_order, id",
        QUESTION_COLUMNS
    );
    let questions = sqlx::query_as::<_, Question>(&sql)
        .bind(quiz_id)
        .fetch_all(&pool)
        .await?;
    Ok(Json(questions))
}

/// Adds a question. Accepts the option-array shape or the lettered A-D shape.
pub async fn create_question(
    State(pool): State<PgPool>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<QuestionInput>,
) -> Result<impl IntoResponse, AppError> {
    let question = payload.normalize()?;

    let sql = format!(
        r#"
        INSERT INTO quiz_questions (quiz_id, question_text, options, correct_answer, sort_order)
        VALUES ($1, $2, $3, $4,
                COALESCE($5, (SELECT COALESCE(MAX(sort_order), -1) + 1
                              FROM quiz_questions WHERE quiz_id = $1)))
        RETURNING {}
        "#,
        QUESTION_COLUMNS
    );
    let created = sqlx::query_as::<_, Question>(&sql)
        .bind(quiz_id)
        .bind(question.question_text.trim())
        .bind(SqlJson(&question.options))
        .bind(question.correct_answer)
        .bind(question.sort_order)
        .fetch_one(&pool)
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// Patches a question. The merged result is validated, so `correct_answer`
/// always indexes into `options`.
pub async fn update_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let sql = format!("SELECT {} FROM quiz_questions WHERE id = $1", QUESTION_COLUMNS);
    let current = sqlx::query_as::<_, Question>(&sql)
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;

    let merged = payload.apply(&current)?;

    let sql = format!(
        r#"
        UPDATE quiz_questions
        SET question_text = $1, options = $2, correct_answer = $3, sort_order = $4
        WHERE id = $5
        RETURNING {}
        "#,
        QUESTION_COLUMNS
    );
    let updated = sqlx::query_as::<_, Question>(&sql)
        .bind(merged.question_text.trim())
        .bind(SqlJson(&merged.options))
        .bind(merged.correct_answer)
        .bind(merged.sort_order.unwrap_or(current.sort_order))
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;

    Ok(Json(updated))
}

pub async fn delete_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    delete_by_id(&pool, "quiz_questions", id, "Question").await?;
    Ok(StatusCode::NO_CONTENT)
}
