// src/handlers/messages.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::message::{ConversationSummary, Message, SendMessageRequest},
    session::Session,
    utils::html::clean_html,
};

const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, content, is_read, created_at";

fn clean_content(payload: &SendMessageRequest) -> Result<String, AppError> {
    payload.validate()?;
    let content = clean_html(&payload.content).trim().to_string();
    if content.is_empty() {
        return Err(AppError::BadRequest("Message cannot be empty".to_string()));
    }
    Ok(content)
}

async fn thread(pool: &PgPool, user_id: i64) -> Result<Vec<Message>, AppError> {
    let sql = format!(
        "SELECT {} FROM messages WHERE sender_id = $1 OR receiver_id = $1 \
         ORDER BY created_at, id",
        MESSAGE_COLUMNS
    );
    let messages = sqlx::query_as::<_, Message>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(messages)
}

/// The caller's conversation with the admins, oldest first.
/// Messages addressed to the caller are marked read.
pub async fn list_my_messages(
    State(pool): State<PgPool>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("UPDATE messages SET is_read = TRUE WHERE receiver_id = $1 AND is_read = FALSE")
        .bind(session.user_id)
        .execute(&pool)
        .await?;

    Ok(Json(thread(&pool, session.user_id).await?))
}

/// Sends a message to the admins. It is addressed to the first admin account,
/// or left unaddressed when none exists.
pub async fn send_message(
    State(pool): State<PgPool>,
    session: Session,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let content = clean_content(&payload)?;

    let admin_id: Option<i64> =
        sqlx::query_scalar("SELECT id FROM users WHERE role = 'admin' ORDER BY id LIMIT 1")
            .fetch_optional(&pool)
            .await?;

    let sql = format!(
        "INSERT INTO messages (sender_id, receiver_id, content) VALUES ($1, $2, $3) RETURNING {}",
        MESSAGE_COLUMNS
    );
    let message = sqlx::query_as::<_, Message>(&sql)
        .bind(session.user_id)
        .bind(admin_id)
        .bind(content)
        .fetch_one(&pool)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// One row per student with messages, most recent conversation first. Admin only.
pub async fn list_conversations(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let conversations = sqlx::query_as::<_, ConversationSummary>(
        r#"
        SELECT u.id AS student_id, u.email AS student_email, u.full_name AS student_name,
               COUNT(*) FILTER (WHERE m.sender_id = u.id AND m.is_read = FALSE) AS unread_count,
               MAX(m.created_at) AS last_message_at
        FROM users u
        JOIN messages m ON m.sender_id = u.id OR m.receiver_id = u.id
        WHERE u.role = 'student'
        GROUP BY u.id, u.email, u.full_name
        ORDER BY last_message_at DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(conversations))
}

/// A student's thread. The student's messages are marked read. Admin only.
pub async fn get_conversation(
    State(pool): State<PgPool>,
    Path(student_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("UPDATE messages SET is_read = TRUE WHERE sender_id = $1 AND is_read = FALSE")
        .bind(student_id)
        .execute(&pool)
        .await?;

    Ok(Json(thread(&pool, student_id).await?))
}

/// Replies to a student. Admin only.
pub async fn reply(
    State(pool): State<PgPool>,
    session: Session,
    Path(student_id): Path<i64>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let content = clean_content(&payload)?;

    let is_student: Option<bool> =
        sqlx::query_scalar("SELECT role = 'student' FROM users WHERE id = $1")
            .bind(student_id)
            .fetch_optional(&pool)
            .await?;
    if is_student != Some(true) {
        return Err(AppError::NotFound("Student not found".to_string()));
    }

    let sql = format!(
        "INSERT INTO messages (sender_id, receiver_id, content) VALUES ($1, $2, $3) RETURNING {}",
        MESSAGE_COLUMNS
    );
    let message = sqlx::query_as::<_, Message>(&sql)
        .bind(session.user_id)
        .bind(student_id)
        .bind(content)
        .fetch_one(&pool)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Deletes a student's whole thread. Admin only.
pub async fn delete_conversation(
    State(pool): State<PgPool>,
    Path(student_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM messages WHERE sender_id = $1 OR receiver_id = $1")
        .bind(student_id)
        .execute(&pool)
        .await?;

    tracing::info!(student_id, deleted = result.rows_affected(), "Conversation deleted");
    Ok(StatusCode::NO_CONTENT)
}
