// src/store/pg.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};

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
    store::Store,
};

const PAYMENT_COLUMNS: &str = "id, student_id, subject_id, amount, receipt_ref, status, \
     admin_notes, reviewed_by, reviewed_at, created_at";

const PROFILE_COLUMNS: &str =
    "id, email, full_name, phone, role, is_approved, is_active, created_at";

const ATTEMPT_COLUMNS: &str = "id, quiz_id, student_id, answers, score, correct_count, \
     total_questions, passed, elapsed_seconds, attempt_number, submitted_at";

/// Attempts to claim the next attempt number before giving up.
const NUMBERING_RETRIES: usize = 5;

/// Postgres-backed [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_attempt(&self, id: uuid::Uuid) -> Result<Option<Attempt>, AppError> {
        let sql = format!("SELECT {} FROM quiz_attempts WHERE id = $1", ATTEMPT_COLUMNS);
        let attempt = sqlx::query_as::<_, Attempt>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(attempt)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get_active_quiz(&self, quiz_id: i64) -> Result<Option<Quiz>, AppError> {
        let quiz = sqlx::query_as::<_, Quiz>(
            r#"
            SELECT id, subject_id, title, description, time_limit_minutes,
                   passing_score, is_active, created_at
            FROM quizzes
            WHERE id = $1 AND is_active = TRUE
            "#,
        )
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(quiz)
    }

    async fn list_questions(&self, quiz_id: i64) -> Result<Vec<Question>, AppError> {
        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, quiz_id, question_text, options, correct_answer, sort_order
            FROM quiz_questions
            WHERE quiz_id = $1
            ORDER BY sort_order, id
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }

    async fn count_attempts(&self, quiz_id: i64, student_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM quiz_attempts WHERE quiz_id = $1 AND student_id = $2",
        )
        .bind(quiz_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn insert_attempt(&self, graded: &GradedAttempt) -> Result<Attempt, AppError> {
        // A previous try may have committed before its response was lost.
        if let Some(existing) = self.find_attempt(graded.id).await? {
            return Ok(existing);
        }

        let sql = format!(
            r#"
            INSERT INTO quiz_attempts
                (id, quiz_id, student_id, answers, score, correct_count,
                 total_questions, passed, elapsed_seconds, attempt_number, submitted_at)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9,
                   COALESCE(MAX(attempt_number), 0) + 1, $10
            FROM quiz_attempts
            WHERE quiz_id = $2 AND student_id = $3
            ON CONFLICT (id) DO NOTHING
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        );

        for _ in 0..NUMBERING_RETRIES {
            let inserted = sqlx::query_as::<_, Attempt>(&sql)
                .bind(graded.id)
                .bind(graded.quiz_id)
                .bind(graded.student_id)
                .bind(Json(&graded.answers))
                .bind(graded.score)
                .bind(graded.correct_count)
                .bind(graded.total_questions)
                .bind(graded.passed)
                .bind(graded.elapsed_seconds)
                .bind(graded.submitted_at)
                .fetch_optional(&self.pool)
                .await;

            match inserted {
                Ok(Some(attempt)) => return Ok(attempt),
                // Lost a race against a concurrent write of the same id.
                Ok(None) => {
                    return self.find_attempt(graded.id).await?.ok_or_else(|| {
                        AppError::InternalServerError(
                            "attempt vanished after conflicting insert".to_string(),
                        )
                    });
                }
                // Another session of the same student took this number.
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    tracing::debug!(attempt_id = %graded.id, "attempt number taken, retrying");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Transient(
            "could not allocate an attempt number".to_string(),
        ))
    }

    async fn list_attempts(
        &self,
        quiz_id: i64,
        student_id: i64,
    ) -> Result<Vec<Attempt>, AppError> {
        let sql = format!(
            "SELECT {} FROM quiz_attempts WHERE quiz_id = $1 AND student_id = $2 \
             ORDER BY attempt_number DESC",
            ATTEMPT_COLUMNS
        );
        let attempts = sqlx::query_as::<_, Attempt>(&sql)
            .bind(quiz_id)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(attempts)
    }

    async fn has_grant(&self, student_id: i64, subject_id: i64) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM student_subject_access
                WHERE student_id = $1 AND subject_id = $2
            )
            "#,
        )
        .bind(student_id)
        .bind(subject_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn upsert_grant(&self, student_id: i64, subject_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO student_subject_access (student_id, subject_id)
            VALUES ($1, $2)
            ON CONFLICT (student_id, subject_id) DO NOTHING
            "#,
        )
        .bind(student_id)
        .bind(subject_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke_grant(&self, student_id: i64, subject_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM student_subject_access WHERE student_id = $1 AND subject_id = $2",
        )
        .bind(student_id)
        .bind(subject_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_grants(&self, student_id: i64) -> Result<Vec<SubjectAccess>, AppError> {
        let grants = sqlx::query_as::<_, SubjectAccess>(
            r#"
            SELECT student_id, subject_id, granted_at
            FROM student_subject_access
            WHERE student_id = $1
            ORDER BY granted_at
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(grants)
    }

    async fn get_profile(&self, user_id: i64) -> Result<Option<Profile>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", PROFILE_COLUMNS);
        let profile = sqlx::query_as::<_, Profile>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    async fn update_profile(
        &self,
        user_id: i64,
        changes: &ProfileChanges,
    ) -> Result<Option<Profile>, AppError> {
        if changes.is_empty() {
            return self.get_profile(user_id).await;
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
        let mut separated = builder.separated(", ");

        if let Some(full_name) = &changes.full_name {
            separated.push("full_name = ");
            separated.push_bind_unseparated(full_name.clone());
        }
        if let Some(phone) = &changes.phone {
            separated.push("phone = ");
            separated.push_bind_unseparated(phone.clone());
        }

        builder.push(" WHERE id = ");
        builder.push_bind(user_id);
        builder.push(" RETURNING ");
        builder.push(PROFILE_COLUMNS);

        let profile = builder
            .build_query_as::<Profile>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update profile: {:?}", e);
                AppError::from(e)
            })?;

        Ok(profile)
    }

    async fn approve_profile(&self, user_id: i64) -> Result<bool, AppError> {
        let changed: Option<bool> = sqlx::query_scalar(
            r#"
            WITH prev AS (
                SELECT id, is_approved FROM users WHERE id = $1 FOR UPDATE
            )
            UPDATE users u
            SET is_approved = TRUE
            FROM prev
            WHERE u.id = prev.id
            RETURNING NOT prev.is_approved
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        changed.ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    async fn subject_is_active(&self, subject_id: i64) -> Result<bool, AppError> {
        let active: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM subjects WHERE id = $1 AND is_active = TRUE)",
        )
        .bind(subject_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(active)
    }

    async fn insert_payment(
        &self,
        student_id: i64,
        req: &CreatePaymentRequest,
    ) -> Result<Payment, AppError> {
        let sql = format!(
            r#"
            INSERT INTO payments (student_id, subject_id, amount, receipt_ref, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(student_id)
            .bind(req.subject_id)
            .bind(req.amount)
            .bind(&req.receipt_ref)
            .fetch_one(&self.pool)
            .await?;

        Ok(payment)
    }

    async fn get_payment(&self, payment_id: i64) -> Result<Option<Payment>, AppError> {
        let sql = format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS);
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    async fn transition_payment(
        &self,
        payment_id: i64,
        to: PaymentStatus,
        reviewer_id: i64,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Option<Payment>, AppError> {
        // The status guard makes the transition one-way even under concurrent reviewers.
        let sql = format!(
            r#"
            UPDATE payments
            SET status = $2, reviewed_by = $3, reviewed_at = $4,
                admin_notes = COALESCE($5, admin_notes)
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(payment_id)
            .bind(to.as_str())
            .bind(reviewer_id)
            .bind(at)
            .bind(notes)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    async fn list_payments(
        &self,
        student_id: Option<i64>,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<Payment>, AppError> {
        let sql = format!(
            r#"
            SELECT {} FROM payments
            WHERE ($1::BIGINT IS NULL OR student_id = $1)
              AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            "#,
            PAYMENT_COLUMNS
        );
        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(student_id)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await?;

        Ok(payments)
    }
}
