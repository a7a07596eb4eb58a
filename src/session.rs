// src/session.rs

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{error::AppError, utils::jwt::Claims};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }

    pub fn parse(role: &str) -> Option<Role> {
        match role {
            "student" => Some(Role::Student),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// The caller of an operation, passed explicitly into every workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub role: Role,
}

impl Session {
    pub fn student(user_id: i64) -> Self {
        Session {
            user_id,
            role: Role::Student,
        }
    }

    pub fn admin(user_id: i64) -> Self {
        Session {
            user_id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin access required".to_string()))
        }
    }

    pub fn require_student(&self) -> Result<(), AppError> {
        if self.role == Role::Student {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Only student accounts can do this".to_string(),
            ))
        }
    }
}

impl TryFrom<&Claims> for Session {
    type Error = AppError;

    fn try_from(claims: &Claims) -> Result<Self, Self::Error> {
        let user_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))?;
        let role = Role::parse(&claims.role)
            .ok_or_else(|| AppError::AuthError("Invalid token role".to_string()))?;
        Ok(Session { user_id, role })
    }
}

/// Reads the `Claims` injected by `auth_middleware`.
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<Claims>()
            .ok_or_else(|| AppError::AuthError("Missing session".to_string()))?;
        Session::try_from(claims)
    }
}
