// src/models/access.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'student_subject_access' table.
/// Existence of a row is the only thing that lets a student see a subject.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct SubjectAccess {
    pub student_id: i64,
    pub subject_id: i64,
    pub granted_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for a direct admin grant.
#[derive(Debug, Deserialize)]
pub struct GrantAccessRequest {
    pub student_id: i64,
    pub subject_id: i64,
}
