// src/models/message.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'messages' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    /// Empty when a student wrote before any admin existed.
    pub receiver_id: Option<i64>,
    pub content: String,
    pub is_read: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Per-student conversation summary on the admin inbox.
#[derive(Debug, Serialize, FromRow)]
pub struct ConversationSummary {
    pub student_id: i64,
    pub student_email: String,
    pub student_name: Option<String>,
    pub unread_count: i64,
    pub last_message_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 4000))]
    pub content: String,
}
