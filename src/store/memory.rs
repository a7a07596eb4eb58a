// src/store/memory.rs

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

use crate::{
    error::AppError,
    models::{
        access::SubjectAccess,
        attempt::{Attempt, GradedAttempt},
        payment::{CreatePaymentRequest, Payment, PaymentStatus},
        question::Question,
        quiz::Quiz,
        subject::Subject,
        user::{Profile, ProfileChanges},
    },
    store::Store,
};

/// Operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    LoadQuiz,
    InsertAttempt,
    HasGrant,
    UpsertGrant,
    ApproveProfile,
    TransitionPayment,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    profiles: BTreeMap<i64, Profile>,
    subjects: BTreeMap<i64, Subject>,
    quizzes: BTreeMap<i64, Quiz>,
    questions: Vec<Question>,
    attempts: Vec<Attempt>,
    grants: BTreeMap<(i64, i64), SubjectAccess>,
    payments: BTreeMap<i64, Payment>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process [`Store`] with fault injection, used by tests and local demos.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    faults: Mutex<HashSet<Fault>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self, fault: Fault) -> Result<(), AppError> {
        let faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        if faults.contains(&fault) {
            return Err(AppError::Transient(format!("injected fault: {:?}", fault)));
        }
        Ok(())
    }

    /// Makes every call of `fault`'s operation fail with a transient error.
    pub fn fail(&self, fault: Fault) {
        self.faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(fault);
    }

    pub fn heal(&self, fault: Fault) {
        self.faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&fault);
    }

    pub fn add_profile(&self, email: &str, role: &str) -> Profile {
        let mut inner = self.lock();
        let id = inner.next_id();
        let profile = Profile {
            id,
            email: email.to_string(),
            full_name: None,
            phone: None,
            role: role.to_string(),
            is_approved: role == "admin",
            is_active: true,
            created_at: Some(Utc::now()),
        };
        inner.profiles.insert(id, profile.clone());
        profile
    }

    pub fn add_subject(&self, title: &str, fee: i64) -> Subject {
        let mut inner = self.lock();
        let id = inner.next_id();
        let subject = Subject {
            id,
            title: title.to_string(),
            description: None,
            fee,
            is_active: true,
            created_at: Some(Utc::now()),
        };
        inner.subjects.insert(id, subject.clone());
        subject
    }

    pub fn add_quiz(&self, subject_id: i64, time_limit_minutes: i32, passing_score: i32) -> Quiz {
        let mut inner = self.lock();
        let id = inner.next_id();
        let quiz = Quiz {
            id,
            subject_id,
            title: format!("Quiz {}", id),
            description: None,
            time_limit_minutes,
            passing_score,
            is_active: true,
            created_at: Some(Utc::now()),
        };
        inner.quizzes.insert(id, quiz.clone());
        quiz
    }

    /// Blocks or unblocks an account.
    pub fn set_active(&self, user_id: i64, active: bool) {
        if let Some(profile) = self.lock().profiles.get_mut(&user_id) {
            profile.is_active = active;
        }
    }

    pub fn set_quiz_active(&self, quiz_id: i64, active: bool) {
        if let Some(quiz) = self.lock().quizzes.get_mut(&quiz_id) {
            quiz.is_active = active;
        }
    }

    /// Adds a question with options "A".."<n>" and the given correct index.
    pub fn add_question(&self, quiz_id: i64, option_count: usize, correct_answer: i32) -> Question {
        let mut inner = self.lock();
        let id = inner.next_id();
        let sort_order = inner.questions.iter().filter(|q| q.quiz_id == quiz_id).count() as i32;
        let options = (0..option_count)
            .map(|i| char::from(b'A' + i as u8).to_string())
            .collect();
        let question = Question {
            id,
            quiz_id,
            question_text: format!("Question {}", id),
            options: Json(options),
            correct_answer,
            sort_order,
        };
        inner.questions.push(question.clone());
        question
    }

    /// Number of grant rows for the pair; never more than one.
    pub fn grant_rows(&self, student_id: i64, subject_id: i64) -> usize {
        self.lock()
            .grants
            .keys()
            .filter(|k| **k == (student_id, subject_id))
            .count()
    }

    pub fn attempt_rows(&self) -> usize {
        self.lock().attempts.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_active_quiz(&self, quiz_id: i64) -> Result<Option<Quiz>, AppError> {
        self.check(Fault::LoadQuiz)?;
        Ok(self
            .lock()
            .quizzes
            .get(&quiz_id)
            .filter(|q| q.is_active)
            .cloned())
    }

    async fn list_questions(&self, quiz_id: i64) -> Result<Vec<Question>, AppError> {
        let mut questions: Vec<Question> = self
            .lock()
            .questions
            .iter()
            .filter(|q| q.quiz_id == quiz_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| (q.sort_order, q.id));
        Ok(questions)
    }

    async fn count_attempts(&self, quiz_id: i64, student_id: i64) -> Result<i64, AppError> {
        Ok(self
            .lock()
            .attempts
            .iter()
            .filter(|a| a.quiz_id == quiz_id && a.student_id == student_id)
            .count() as i64)
    }

    async fn insert_attempt(&self, graded: &GradedAttempt) -> Result<Attempt, AppError> {
        self.check(Fault::InsertAttempt)?;
        let mut inner = self.lock();
        if let Some(existing) = inner.attempts.iter().find(|a| a.id == graded.id) {
            return Ok(existing.clone());
        }
        let number = inner
            .attempts
            .iter()
            .filter(|a| a.quiz_id == graded.quiz_id && a.student_id == graded.student_id)
            .map(|a| a.attempt_number)
            .max()
            .unwrap_or(0)
            + 1;
        let attempt = graded.clone().into_attempt(number);
        inner.attempts.push(attempt.clone());
        Ok(attempt)
    }

    async fn list_attempts(
        &self,
        quiz_id: i64,
        student_id: i64,
    ) -> Result<Vec<Attempt>, AppError> {
        let mut attempts: Vec<Attempt> = self
            .lock()
            .attempts
            .iter()
            .filter(|a| a.quiz_id == quiz_id && a.student_id == student_id)
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.attempt_number.cmp(&a.attempt_number));
        Ok(attempts)
    }

    async fn has_grant(&self, student_id: i64, subject_id: i64) -> Result<bool, AppError> {
        self.check(Fault::HasGrant)?;
        Ok(self.lock().grants.contains_key(&(student_id, subject_id)))
    }

    async fn upsert_grant(&self, student_id: i64, subject_id: i64) -> Result<bool, AppError> {
        self.check(Fault::UpsertGrant)?;
        let mut inner = self.lock();
        if inner.grants.contains_key(&(student_id, subject_id)) {
            return Ok(false);
        }
        inner.grants.insert(
            (student_id, subject_id),
            SubjectAccess {
                student_id,
                subject_id,
                granted_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn revoke_grant(&self, student_id: i64, subject_id: i64) -> Result<bool, AppError> {
        Ok(self
            .lock()
            .grants
            .remove(&(student_id, subject_id))
            .is_some())
    }

    async fn list_grants(&self, student_id: i64) -> Result<Vec<SubjectAccess>, AppError> {
        Ok(self
            .lock()
            .grants
            .values()
            .filter(|g| g.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn get_profile(&self, user_id: i64) -> Result<Option<Profile>, AppError> {
        Ok(self.lock().profiles.get(&user_id).cloned())
    }

    async fn update_profile(
        &self,
        user_id: i64,
        changes: &ProfileChanges,
    ) -> Result<Option<Profile>, AppError> {
        let mut inner = self.lock();
        let Some(profile) = inner.profiles.get_mut(&user_id) else {
            return Ok(None);
        };
        if let Some(full_name) = &changes.full_name {
            profile.full_name = full_name.clone();
        }
        if let Some(phone) = &changes.phone {
            profile.phone = phone.clone();
        }
        Ok(Some(profile.clone()))
    }

    async fn approve_profile(&self, user_id: i64) -> Result<bool, AppError> {
        self.check(Fault::ApproveProfile)?;
        let mut inner = self.lock();
        let profile = inner
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        let changed = !profile.is_approved;
        profile.is_approved = true;
        Ok(changed)
    }

    async fn subject_is_active(&self, subject_id: i64) -> Result<bool, AppError> {
        Ok(self
            .lock()
            .subjects
            .get(&subject_id)
            .is_some_and(|s| s.is_active))
    }

    async fn insert_payment(
        &self,
        student_id: i64,
        req: &CreatePaymentRequest,
    ) -> Result<Payment, AppError> {
        let mut inner = self.lock();
        let id = inner.next_id();
        let payment = Payment {
            id,
            student_id,
            subject_id: req.subject_id,
            amount: req.amount,
            receipt_ref: req.receipt_ref.clone(),
            status: PaymentStatus::Pending,
            admin_notes: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
        };
        inner.payments.insert(id, payment.clone());
        Ok(payment)
    }

    async fn get_payment(&self, payment_id: i64) -> Result<Option<Payment>, AppError> {
        Ok(self.lock().payments.get(&payment_id).cloned())
    }

    async fn transition_payment(
        &self,
        payment_id: i64,
        to: PaymentStatus,
        reviewer_id: i64,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Option<Payment>, AppError> {
        self.check(Fault::TransitionPayment)?;
        let mut inner = self.lock();
        let Some(payment) = inner.payments.get_mut(&payment_id) else {
            return Ok(None);
        };
        if payment.status != PaymentStatus::Pending {
            return Ok(None);
        }
        payment.status = to;
        payment.reviewed_by = Some(reviewer_id);
        payment.reviewed_at = Some(at);
        if let Some(notes) = notes {
            payment.admin_notes = Some(notes.to_string());
        }
        Ok(Some(payment.clone()))
    }

    async fn list_payments(
        &self,
        student_id: Option<i64>,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<Payment>, AppError> {
        let mut payments: Vec<Payment> = self
            .lock()
            .payments
            .values()
            .filter(|p| student_id.is_none_or(|s| p.student_id == s))
            .filter(|p| status.is_none_or(|s| p.status == s))
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(payments)
    }
}
