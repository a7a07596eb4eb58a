// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{CreateUserRequest, LoginRequest, Profile, User},
    session::Role,
    utils::{
        hash::{hash_password, verify_password},
        html::clean_optional,
        jwt::sign_jwt,
    },
};

pub(crate) const USER_COLUMNS: &str =
    "id, email, password, full_name, phone, role, is_approved, is_active, created_at";

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Registers a new student account.
///
/// The account starts unapproved; approval comes from an admin or from the
/// first approved payment. Returns 201 Created and the profile.
pub async fn register(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let email = normalize_email(&payload.email);
    let hashed_password = hash_password(&payload.password)?;
    let full_name = clean_optional(payload.full_name.as_deref());

    let sql = format!(
        "INSERT INTO users (email, password, full_name) VALUES ($1, $2, $3) RETURNING {}",
        USER_COLUMNS
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(&email)
        .bind(hashed_password)
        .bind(full_name)
        .fetch_one(&pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => {
                AppError::Conflict(format!("E-mail '{}' is already registered", email))
            }
            other => {
                tracing::error!("Failed to register user: {:?}", other);
                other
            }
        })?;

    tracing::info!(user_id = user.id, "Student registered");
    Ok((StatusCode::CREATED, Json(Profile::from(user))))
}

/// Authenticates a user and returns a JWT.
///
/// Unknown e-mail and wrong password give the same 401; blocked accounts get 403.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(normalize_email(&payload.email))
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::AuthError("Invalid e-mail or password".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError("Invalid e-mail or password".to_string()));
    }

    if !user.is_active {
        tracing::info!(user_id = user.id, "Blocked user tried to log in");
        return Err(AppError::Forbidden("This account has been blocked".to_string()));
    }

    let role = Role::parse(&user.role)
        .ok_or_else(|| AppError::InternalServerError(format!("unknown role '{}'", user.role)))?;
    let token = sign_jwt(user.id, role, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "role": role.as_str(),
        "is_approved": user.is_approved
    })))
}

/// Creates the configured admin account if it does not exist yet.
pub async fn seed_admin(pool: &PgPool, config: &Config) -> Result<(), AppError> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };
    let email = normalize_email(email);

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(pool)
        .await?;
    if exists.is_some() {
        return Ok(());
    }

    tracing::info!("Seeding admin user: {}", email);
    sqlx::query(
        "INSERT INTO users (email, password, role, is_approved) VALUES ($1, $2, 'admin', TRUE)",
    )
    .bind(&email)
    .bind(hash_password(password)?)
    .execute(pool)
    .await?;
    tracing::info!("Admin user created successfully.");

    Ok(())
}
