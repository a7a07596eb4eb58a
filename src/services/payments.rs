// src/services/payments.rs

//! Payment approval workflow: `pending -> approved | rejected`.
//!
//! Approving runs three steps against storage. Each step is idempotent, so a
//! failure after the status update is repaired by `ensure_access` or by a
//! `reconcile` pass.

use chrono::Utc;
use validator::Validate;

use crate::{
    error::{AppError, ApprovalStep},
    models::payment::{
        AccessRepair, CreatePaymentRequest, Decision, Payment, PaymentStatus, ReconcileReport,
    },
    session::Session,
    store::Store,
};

/// Records a payment claim in `pending` status.
pub async fn submit_payment(
    store: &dyn Store,
    session: &Session,
    req: &CreatePaymentRequest,
) -> Result<Payment, AppError> {
    session.require_student()?;
    req.validate()?;
    if req.receipt_ref.trim().is_empty() {
        return Err(AppError::BadRequest("A receipt is required".to_string()));
    }

    if !store.subject_is_active(req.subject_id).await? {
        return Err(AppError::NotFound("Subject not found".to_string()));
    }

    if store.has_grant(session.user_id, req.subject_id).await? {
        tracing::info!(
            student_id = session.user_id,
            subject_id = req.subject_id,
            "Payment submitted for a subject the student can already access"
        );
    }

    let payment = store.insert_payment(session.user_id, req).await?;
    tracing::info!(
        payment_id = payment.id,
        student_id = payment.student_id,
        subject_id = payment.subject_id,
        amount = payment.amount,
        "Payment submitted"
    );
    Ok(payment)
}

/// Approves or rejects a pending payment.
///
/// The status update is conditional on `pending`, so of two concurrent
/// deciders exactly one wins and the other gets `Conflict`.
pub async fn decide(
    store: &dyn Store,
    session: &Session,
    payment_id: i64,
    decision: Decision,
    notes: Option<&str>,
) -> Result<Payment, AppError> {
    session.require_admin()?;

    let current = store
        .get_payment(payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", payment_id)))?;
    if current.status != PaymentStatus::Pending {
        return Err(already_decided(&current));
    }

    let updated = store
        .transition_payment(
            payment_id,
            decision.target_status(),
            session.user_id,
            notes,
            Utc::now(),
        )
        .await
        .map_err(|e| incomplete(payment_id, ApprovalStep::StatusUpdate, e))?;

    let payment = match updated {
        Some(payment) => payment,
        None => {
            // Lost the race, or the row vanished in between.
            return Err(match store.get_payment(payment_id).await? {
                Some(p) => already_decided(&p),
                None => AppError::NotFound(format!("Payment {} not found", payment_id)),
            });
        }
    };

    tracing::info!(
        payment_id,
        reviewer_id = session.user_id,
        status = %payment.status,
        "Payment decided"
    );

    if decision == Decision::Approve {
        apply_access(store, &payment).await?;
    }

    Ok(payment)
}

/// Re-runs the access steps for one approved payment.
pub async fn ensure_access(
    store: &dyn Store,
    session: &Session,
    payment_id: i64,
) -> Result<AccessRepair, AppError> {
    session.require_admin()?;

    let payment = store
        .get_payment(payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", payment_id)))?;
    if payment.status != PaymentStatus::Approved {
        return Err(AppError::Conflict(format!(
            "Payment {} is {}, not approved",
            payment_id, payment.status
        )));
    }

    apply_access(store, &payment).await
}

/// Runs `ensure_access` over every approved payment.
///
/// A failing payment is recorded in the report and the pass continues.
pub async fn reconcile(store: &dyn Store, session: &Session) -> Result<ReconcileReport, AppError> {
    session.require_admin()?;

    let approved = store
        .list_payments(None, Some(PaymentStatus::Approved))
        .await?;
    let mut report = ReconcileReport::default();

    for payment in &approved {
        report.checked += 1;
        match apply_access(store, payment).await {
            Ok(repair) => {
                report.grants_created += usize::from(repair.grant_created);
                report.profiles_approved += usize::from(repair.profile_approved);
            }
            Err(e) => {
                tracing::warn!(payment_id = payment.id, "Reconcile failed: {}", e);
                report.failed.push(payment.id);
            }
        }
    }

    tracing::info!(
        checked = report.checked,
        grants_created = report.grants_created,
        profiles_approved = report.profiles_approved,
        failed = report.failed.len(),
        "Payment reconciliation finished"
    );
    Ok(report)
}

async fn apply_access(store: &dyn Store, payment: &Payment) -> Result<AccessRepair, AppError> {
    let grant_created = store
        .upsert_grant(payment.student_id, payment.subject_id)
        .await
        .map_err(|e| incomplete(payment.id, ApprovalStep::GrantAccess, e))?;

    let profile_approved = store
        .approve_profile(payment.student_id)
        .await
        .map_err(|e| incomplete(payment.id, ApprovalStep::ApproveProfile, e))?;

    if grant_created || profile_approved {
        tracing::info!(
            payment_id = payment.id,
            student_id = payment.student_id,
            subject_id = payment.subject_id,
            grant_created,
            profile_approved,
            "Access applied for approved payment"
        );
    }

    Ok(AccessRepair {
        grant_created,
        profile_approved,
    })
}

fn already_decided(payment: &Payment) -> AppError {
    AppError::Conflict(format!(
        "Payment {} has already been {}",
        payment.id, payment.status
    ))
}

fn incomplete(payment_id: i64, step: ApprovalStep, source: AppError) -> AppError {
    tracing::error!(payment_id, %step, "Payment approval step failed: {}", source);
    AppError::ApprovalIncomplete {
        payment_id,
        step,
        message: source.to_string(),
    }
}
