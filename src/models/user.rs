// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'users' table in the database.
/// Only the auth handlers read this row; everything else works with `Profile`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique login e-mail.
    pub email: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    pub full_name: Option<String>,

    pub phone: Option<String>,

    /// User role: 'student' or 'admin'.
    pub role: String,

    pub is_approved: bool,

    pub is_active: bool,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Public view of a user.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: String,

    /// Set by an admin, or automatically when a payment is approved.
    pub is_approved: bool,

    /// False when the account is blocked.
    pub is_active: bool,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<User> for Profile {
    fn from(user: User) -> Self {
        Profile {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            phone: user.phone,
            role: user.role,
            is_approved: user.is_approved,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

/// Admin listing row: a student plus the subjects they can open.
#[derive(Debug, Serialize)]
pub struct StudentSummary {
    #[serde(flatten)]
    pub profile: Profile,
    pub subject_ids: Vec<i64>,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "A valid e-mail address is required."))]
    pub email: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Password length must be between 6 and 128 characters."
    ))]
    pub password: String,
    #[validate(length(max = 255))]
    pub full_name: Option<String>,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 255))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for users editing their own profile.
/// Absent fields are left alone; a blank value clears the field.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 255))]
    pub full_name: Option<String>,
    #[validate(length(max = 32, message = "Phone number is too long."))]
    pub phone: Option<String>,
}

/// Sanitized profile changes. `Some(None)` clears a column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileChanges {
    pub full_name: Option<Option<String>>,
    pub phone: Option<Option<String>>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.phone.is_none()
    }
}

/// Digits with optional `+`, spaces, dashes, dots and parentheses.
pub fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    (5..=20).contains(&digits)
        && phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '.' | '(' | ')'))
}

/// DTO for an admin changing a student's account flags.
#[derive(Debug, Deserialize)]
pub struct UpdateStudentRequest {
    pub is_approved: Option<bool>,
    pub is_active: Option<bool>,
}
