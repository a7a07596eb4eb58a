// src/models/payment.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for PaymentStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "approved" => Ok(PaymentStatus::Approved),
            "rejected" => Ok(PaymentStatus::Rejected),
            other => Err(format!("unknown payment status '{}'", other)),
        }
    }
}

/// Represents the 'payments' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: i64,
    pub student_id: i64,
    pub subject_id: i64,
    pub amount: i64,
    /// Opaque pointer to the uploaded receipt.
    pub receipt_ref: String,
    #[sqlx(try_from = "String")]
    pub status: PaymentStatus,
    pub admin_notes: Option<String>,
    /// Set only when the payment leaves `pending`.
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Admin decision on a pending payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn target_status(self) -> PaymentStatus {
        match self {
            Decision::Approve => PaymentStatus::Approved,
            Decision::Reject => PaymentStatus::Rejected,
        }
    }
}

/// DTO for a student submitting a payment claim.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    pub subject_id: i64,
    #[validate(range(min = 1, message = "Amount must be positive."))]
    pub amount: i64,
    #[validate(length(min = 1, max = 1000, message = "A receipt is required."))]
    pub receipt_ref: String,
}

/// DTO for an admin deciding a payment.
#[derive(Debug, Deserialize, Validate)]
pub struct DecidePaymentRequest {
    pub decision: Decision,
    #[validate(length(max = 2000))]
    pub admin_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentListParams {
    pub status: Option<PaymentStatus>,
}

/// Admin listing row, joined with student and subject.
#[derive(Debug, Serialize, FromRow)]
pub struct PaymentEntry {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub payment: Payment,
    pub student_email: String,
    pub student_name: Option<String>,
    pub subject_title: String,
}

/// What an `ensure_access` run had to repair for one payment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccessRepair {
    pub grant_created: bool,
    pub profile_approved: bool,
}

/// Outcome of a reconciliation pass over approved payments.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct ReconcileReport {
    pub checked: usize,
    pub grants_created: usize,
    pub profiles_approved: usize,
    /// Payments whose repair failed; safe to run again.
    pub failed: Vec<i64>,
}
