// src/services/access.rs

//! The access gate guarding every student read of subject content.

use crate::{error::AppError, session::Session, store::Store};

/// `exists SubjectAccess(student, subject)`.
pub async fn has_access(
    store: &dyn Store,
    student_id: i64,
    subject_id: i64,
) -> Result<bool, AppError> {
    store.has_grant(student_id, subject_id).await
}

/// Denies unless the session may read `subject_id`.
///
/// Admins pass. A storage failure denies as well; the gate never fails open.
pub async fn require_access(
    store: &dyn Store,
    session: &Session,
    subject_id: i64,
) -> Result<(), AppError> {
    if session.is_admin() {
        return Ok(());
    }

    match has_access(store, session.user_id, subject_id).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(AppError::Forbidden(
            "You do not have access to this subject".to_string(),
        )),
        Err(e) => {
            tracing::error!(
                student_id = session.user_id,
                subject_id,
                "Access check failed, denying: {}",
                e
            );
            Err(AppError::Forbidden(
                "Access could not be verified".to_string(),
            ))
        }
    }
}
