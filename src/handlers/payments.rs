// src/handlers/payments.rs

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::payment::{
        CreatePaymentRequest, DecidePaymentRequest, PaymentEntry, PaymentListParams,
    },
    services::payments,
    session::Session,
    store::Store,
    utils::{
        file_magic::{
            matches_magic_bytes, receipt_content_type, receipt_extension, receipt_path,
        },
        html::clean_optional,
    },
};

/// The caller's own payments, newest first.
pub async fn list_my_payments(
    State(store): State<Arc<dyn Store>>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let payments = store.list_payments(Some(session.user_id), None).await?;
    Ok(Json(payments))
}

pub async fn create_payment(
    State(store): State<Arc<dyn Store>>,
    session: Session,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payment = payments::submit_payment(store.as_ref(), &session, &payload).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// Stores a receipt image or PDF and returns the reference to put on a payment.
///
/// Expects one multipart field named `file`. The reference is relative to
/// `RECEIPT_DIR`: `<student_id>/<uuid>.<ext>`.
pub async fn upload_receipt(
    State(config): State<Config>,
    session: Session,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    session.require_student()?;

    let mut stored: Option<(String, Vec<u8>)> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some("file") {
            continue;
        }
        if stored.is_some() {
            return Err(AppError::BadRequest(
                "Only one receipt can be uploaded at a time".to_string(),
            ));
        }

        let extension = field
            .file_name()
            .and_then(receipt_extension)
            .ok_or_else(|| {
                AppError::BadRequest("Receipt must be a PNG, JPEG, WebP or PDF file".to_string())
            })?;

        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(bad_multipart)? {
            data.extend_from_slice(&chunk);
            if data.len() > config.max_receipt_bytes {
                return Err(AppError::BadRequest(format!(
                    "Receipt exceeds the {} byte limit",
                    config.max_receipt_bytes
                )));
            }
        }

        if !matches_magic_bytes(&data, &extension) {
            return Err(AppError::BadRequest(
                "File content does not match its extension".to_string(),
            ));
        }
        stored = Some((extension, data));
    }

    let (extension, data) =
        stored.ok_or_else(|| AppError::BadRequest("No receipt file in upload".to_string()))?;

    let receipt_ref = format!("{}/{}.{}", session.user_id, Uuid::new_v4(), extension);
    let path = PathBuf::from(&config.receipt_dir).join(&receipt_ref);
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            tracing::error!("Failed to create receipt directory: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;
    }
    tokio::fs::write(&path, &data).await.map_err(|e| {
        tracing::error!("Failed to write receipt: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    tracing::info!(
        student_id = session.user_id,
        size = data.len(),
        %receipt_ref,
        "Receipt stored"
    );
    Ok((StatusCode::CREATED, Json(json!({ "receipt_ref": receipt_ref }))))
}

/// Returns the receipt attached to a payment.
///
/// Admins can read any receipt, students only their own. Receipts are bounded
/// by `MAX_RECEIPT_BYTES`, so the file is read in one go.
pub async fn get_receipt(
    State(config): State<Config>,
    State(store): State<Arc<dyn Store>>,
    session: Session,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let payment = store
        .get_payment(id)
        .await?
        .filter(|p| session.is_admin() || p.student_id == session.user_id)
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

    let unavailable = || AppError::NotFound("Receipt not available".to_string());

    let content_type = receipt_extension(&payment.receipt_ref)
        .and_then(|ext| receipt_content_type(&ext))
        .ok_or_else(unavailable)?;
    let path = receipt_path(std::path::Path::new(&config.receipt_dir), &payment.receipt_ref)
        .ok_or_else(|| {
            tracing::warn!(payment_id = id, receipt_ref = %payment.receipt_ref, "Rejected receipt path");
            unavailable()
        })?;

    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(unavailable()),
        Err(e) => {
            tracing::error!("Failed to read receipt: {:?}", e);
            return Err(AppError::InternalServerError(e.to_string()));
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        data,
    ))
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::BadRequest(e.body_text())
}

/// Lists payments joined with student and subject. Admin only.
pub async fn admin_list_payments(
    State(pool): State<PgPool>,
    Query(params): Query<PaymentListParams>,
) -> Result<impl IntoResponse, AppError> {
    let entries = sqlx::query_as::<_, PaymentEntry>(
        r#"
        SELECT p.id, p.student_id, p.subject_id, p.amount, p.receipt_ref, p.status,
               p.admin_notes, p.reviewed_by, p.reviewed_at, p.created_at,
               u.email AS student_email, u.full_name AS student_name,
               s.title AS subject_title
        FROM payments p
        JOIN users u ON u.id = p.student_id
        JOIN subjects s ON s.id = p.subject_id
        WHERE ($1::TEXT IS NULL OR p.status = $1)
        ORDER BY p.created_at DESC, p.id DESC
        "#,
    )
    .bind(params.status.map(|s| s.as_str()))
    .fetch_all(&pool)
    .await?;

    Ok(Json(entries))
}

/// Approves or rejects a pending payment. Admin only.
pub async fn decide_payment(
    State(store): State<Arc<dyn Store>>,
    session: Session,
    Path(id): Path<i64>,
    Json(payload): Json<DecidePaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let notes = clean_optional(payload.admin_notes.as_deref());

    let payment = payments::decide(
        store.as_ref(),
        &session,
        id,
        payload.decision,
        notes.as_deref(),
    )
    .await?;
    Ok(Json(payment))
}

/// Re-applies grant and approval for an approved payment. Admin only.
pub async fn ensure_payment_access(
    State(store): State<Arc<dyn Store>>,
    session: Session,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let repair = payments::ensure_access(store.as_ref(), &session, id).await?;
    Ok(Json(repair))
}

pub async fn reconcile_payments(
    State(store): State<Arc<dyn Store>>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let report = payments::reconcile(store.as_ref(), &session).await?;
    Ok(Json(report))
}
