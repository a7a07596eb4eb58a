// src/handlers/profile.rs

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{
        Profile, ProfileChanges, StudentSummary, UpdateProfileRequest, is_valid_phone,
    },
    session::Session,
    store::Store,
    utils::html::clean_optional,
};

async fn summary(store: &dyn Store, profile: Profile) -> Result<StudentSummary, AppError> {
    let subject_ids = store
        .list_grants(profile.id)
        .await?
        .into_iter()
        .map(|g| g.subject_id)
        .collect();

    Ok(StudentSummary {
        profile,
        subject_ids,
    })
}

/// Current user's profile plus the subjects they can open.
pub async fn get_me(
    State(store): State<Arc<dyn Store>>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let profile = store
        .get_profile(session.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(summary(store.as_ref(), profile).await?))
}

/// Updates the caller's name and phone number.
pub async fn update_me(
    State(store): State<Arc<dyn Store>>,
    session: Session,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let phone = payload.phone.as_deref().map(str::trim);
    if let Some(phone) = phone.filter(|p| !p.is_empty()) {
        if !is_valid_phone(phone) {
            return Err(AppError::BadRequest("Phone number is not valid".to_string()));
        }
    }

    let changes = ProfileChanges {
        full_name: payload
            .full_name
            .as_deref()
            .map(|name| clean_optional(Some(name))),
        phone: phone.map(|p| clean_optional(Some(p))),
    };

    let profile = store
        .update_profile(session.user_id, &changes)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = session.user_id, "Profile updated");
    Ok(Json(summary(store.as_ref(), profile).await?))
}
