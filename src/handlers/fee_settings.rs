// src/handlers/fee_settings.rs

use axum::{Json, extract::State, response::IntoResponse};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::fee_settings::{FeeSettings, UpdateFeeSettingsRequest},
    utils::html::clean_optional,
};

const FEE_SETTINGS_COLUMNS: &str =
    "bank_name, account_number, account_holder, payment_instructions, updated_at";

/// Bank details for paying fees. Empty until an admin saves them.
pub async fn get_fee_settings(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let sql = format!("SELECT {} FROM fee_settings WHERE id = 1", FEE_SETTINGS_COLUMNS);
    let settings = sqlx::query_as::<_, FeeSettings>(&sql)
        .fetch_optional(&pool)
        .await?
        .unwrap_or_default();

    Ok(Json(settings))
}

/// Replaces the fee settings. Admin only.
pub async fn update_fee_settings(
    State(pool): State<PgPool>,
    Json(payload): Json<UpdateFeeSettingsRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let sql = format!(
        r#"
        INSERT INTO fee_settings
            (id, bank_name, account_number, account_holder, payment_instructions, updated_at)
        VALUES (1, $1, $2, $3, $4, NOW())
        ON CONFLICT (id) DO UPDATE SET
            bank_name = EXCLUDED.bank_name,
            account_number = EXCLUDED.account_number,
            account_holder = EXCLUDED.account_holder,
            payment_instructions = EXCLUDED.payment_instructions,
            updated_at = EXCLUDED.updated_at
        RETURNING {}
        "#,
        FEE_SETTINGS_COLUMNS
    );
    let settings = sqlx::query_as::<_, FeeSettings>(&sql)
        .bind(clean_optional(payload.bank_name.as_deref()))
        .bind(clean_optional(payload.account_number.as_deref()))
        .bind(clean_optional(payload.account_holder.as_deref()))
        .bind(clean_optional(payload.payment_instructions.as_deref()))
        .fetch_one(&pool)
        .await?;

    tracing::info!("Fee settings updated");
    Ok(Json(settings))
}
