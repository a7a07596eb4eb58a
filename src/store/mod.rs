// src/store/mod.rs

//! Storage seam for the quiz engine, the payment workflow and the access gate.
//!
//! Handlers that only do plain CRUD talk to the pool directly; the workflows go
//! through [`Store`] so they can run against [`MemoryStore`] in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        access::SubjectAccess,
        attempt::{Attempt, GradedAttempt},
        payment::{CreatePaymentRequest, Payment, PaymentStatus},
        question::Question,
        quiz::Quiz,
        user::{Profile, ProfileChanges},
    },
};

pub mod memory;
pub mod pg;

pub use memory::{Fault, MemoryStore};
pub use pg::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Returns the quiz only if it exists and is active.
    async fn get_active_quiz(&self, quiz_id: i64) -> Result<Option<Quiz>, AppError>;

    /// Questions in display order (`sort_order`, then id).
    async fn list_questions(&self, quiz_id: i64) -> Result<Vec<Question>, AppError>;

    async fn count_attempts(&self, quiz_id: i64, student_id: i64) -> Result<i64, AppError>;

    /// Stores a graded attempt and assigns its attempt number.
    /// Inserting the same attempt id twice returns the first row unchanged.
    async fn insert_attempt(&self, graded: &GradedAttempt) -> Result<Attempt, AppError>;

    async fn list_attempts(&self, quiz_id: i64, student_id: i64)
    -> Result<Vec<Attempt>, AppError>;

    async fn has_grant(&self, student_id: i64, subject_id: i64) -> Result<bool, AppError>;

    /// Creates the grant if missing. Returns true when a row was created.
    async fn upsert_grant(&self, student_id: i64, subject_id: i64) -> Result<bool, AppError>;

    /// Returns true when a row was removed.
    async fn revoke_grant(&self, student_id: i64, subject_id: i64) -> Result<bool, AppError>;

    async fn list_grants(&self, student_id: i64) -> Result<Vec<SubjectAccess>, AppError>;

    async fn get_profile(&self, user_id: i64) -> Result<Option<Profile>, AppError>;

    /// Applies the user's own profile edits. None when the user does not exist.
    async fn update_profile(
        &self,
        user_id: i64,
        changes: &ProfileChanges,
    ) -> Result<Option<Profile>, AppError>;

    /// Sets `is_approved = true`. Returns true when the flag changed.
    /// Fails with NotFound when the user does not exist.
    async fn approve_profile(&self, user_id: i64) -> Result<bool, AppError>;

    /// True when the subject exists and is active.
    async fn subject_is_active(&self, subject_id: i64) -> Result<bool, AppError>;

    async fn insert_payment(
        &self,
        student_id: i64,
        req: &CreatePaymentRequest,
    ) -> Result<Payment, AppError>;

    async fn get_payment(&self, payment_id: i64) -> Result<Option<Payment>, AppError>;

    /// Moves a payment out of `pending`. Returns None when the payment is
    /// missing or no longer pending, leaving the row untouched.
    async fn transition_payment(
        &self,
        payment_id: i64,
        to: PaymentStatus,
        reviewer_id: i64,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Option<Payment>, AppError>;

    /// Newest first.
    async fn list_payments(
        &self,
        student_id: Option<i64>,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<Payment>, AppError>;
}
