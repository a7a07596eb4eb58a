// src/models/fee_settings.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Bank details and instructions shown to students before paying.
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
pub struct FeeSettings {
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_holder: Option<String>,
    pub payment_instructions: Option<String>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateFeeSettingsRequest {
    #[validate(length(max = 200))]
    pub bank_name: Option<String>,
    #[validate(length(max = 100))]
    pub account_number: Option<String>,
    #[validate(length(max = 200))]
    pub account_holder: Option<String>,
    #[validate(length(max = 5000))]
    pub payment_instructions: Option<String>,
}
