// src/services/attempts.rs

//! Live quiz attempts: loading, answering, the countdown task and submission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;

use crate::{
    error::AppError,
    models::attempt::{AnswerRequest, Attempt, AttemptHistory, AttemptPhase, AttemptView},
    services::{
        access,
        engine::{AttemptEngine, Tick},
    },
    session::Session,
    store::Store,
};

/// One attempt in memory, shared by request handlers and its countdown task.
pub struct LiveAttempt {
    engine: tokio::sync::Mutex<AttemptEngine>,
    /// Set before the first write of a result; the countdown stops on it.
    finished: AtomicBool,
    timer: Mutex<Option<AbortHandle>>,
}

impl LiveAttempt {
    pub fn new(engine: AttemptEngine) -> Arc<Self> {
        Arc::new(LiveAttempt {
            engine: tokio::sync::Mutex::new(engine),
            finished: AtomicBool::new(false),
            timer: Mutex::new(None),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub async fn view(&self) -> AttemptView {
        self.engine.lock().await.view()
    }

    pub async fn record_answer(
        &self,
        question_id: i64,
        option_index: i32,
    ) -> Result<AttemptView, AppError> {
        let mut engine = self.engine.lock().await;
        engine.record_answer(question_id, option_index)?;
        Ok(engine.view())
    }

    /// Grades and stores the attempt.
    ///
    /// Calls are serialized on the engine lock, so a manual submit racing the
    /// countdown produces one record. Once stored, every call returns that
    /// record. If the write fails the graded result is kept and the next call
    /// re-sends it unchanged.
    pub async fn submit(&self, store: &dyn Store) -> Result<Attempt, AppError> {
        let mut engine = self.engine.lock().await;
        if let Some(saved) = engine.saved() {
            return Ok(saved.clone());
        }

        let graded = engine.grade(Utc::now())?;
        self.finished.store(true, Ordering::SeqCst);

        match store.insert_attempt(&graded).await {
            Ok(attempt) => {
                tracing::info!(
                    attempt_id = %attempt.id,
                    quiz_id = attempt.quiz_id,
                    student_id = attempt.student_id,
                    score = attempt.score,
                    attempt_number = attempt.attempt_number,
                    "Quiz attempt stored"
                );
                engine.mark_saved(attempt.clone());
                Ok(attempt)
            }
            Err(e) => {
                tracing::warn!(
                    attempt_id = %graded.id,
                    score = graded.score,
                    "Storing quiz attempt failed, result kept for retry: {}",
                    e
                );
                Err(e)
            }
        }
    }

    /// Starts the countdown. Each `period` removes one second; at zero the
    /// attempt is submitted once and `on_stored` gets the saved record.
    /// The task only holds a weak reference.
    pub fn start_timer<F>(self: &Arc<Self>, store: Arc<dyn Store>, period: Duration, on_stored: F)
    where
        F: FnOnce(&Arc<LiveAttempt>, &Attempt) + Send + 'static,
    {
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;
                let Some(live) = weak.upgrade() else { break };
                if live.is_finished() {
                    break;
                }

                let tick = live.engine.lock().await.tick();
                match tick {
                    Tick::Running(_) => continue,
                    Tick::Idle => break,
                    Tick::Expired => {
                        match live.submit(store.as_ref()).await {
                            Ok(attempt) => {
                                tracing::info!(
                                    attempt_id = %attempt.id,
                                    "Time limit reached, attempt submitted"
                                );
                                on_stored(&live, &attempt);
                            }
                            Err(e) => tracing::warn!(
                                "Time limit reached but auto-submit failed: {}",
                                e
                            ),
                        }
                        break;
                    }
                }
            }
        });

        let mut timer = self.timer.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = timer.replace(handle.abort_handle()) {
            previous.abort();
        }
    }

    pub fn cancel_timer(&self) {
        let mut timer = self.timer.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = timer.take() {
            handle.abort();
        }
    }
}

impl Drop for LiveAttempt {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

/// Attempts keyed by `(quiz_id, student_id)`.
///
/// `live` holds an engine while the attempt runs or while its result is not
/// yet stored. Once stored, the engine is dropped and only the record is kept
/// so a repeated submit returns it.
#[derive(Default)]
struct Registry {
    live: DashMap<(i64, i64), Arc<LiveAttempt>>,
    stored: DashMap<(i64, i64), Attempt>,
}

impl Registry {
    /// Swaps a stored attempt's engine for its record. No-op when `live` was
    /// already settled or replaced.
    fn settle(&self, key: (i64, i64), live: &Arc<LiveAttempt>, attempt: &Attempt) {
        if self
            .live
            .remove_if(&key, |_, entry| Arc::ptr_eq(entry, live))
            .is_some()
        {
            self.stored.insert(key, attempt.clone());
        }
    }
}

/// Quiz attempt operations plus the registry of live attempts.
pub struct QuizAttempts {
    store: Arc<dyn Store>,
    registry: Arc<Registry>,
    tick: Duration,
}

impl QuizAttempts {
    pub fn new(store: Arc<dyn Store>, tick: Duration) -> Self {
        QuizAttempts {
            store,
            registry: Arc::new(Registry::default()),
            tick,
        }
    }

    fn get(&self, quiz_id: i64, student_id: i64) -> Option<Arc<LiveAttempt>> {
        self.registry
            .live
            .get(&(quiz_id, student_id))
            .map(|entry| entry.value().clone())
    }

    fn require_live(&self, session: &Session, quiz_id: i64) -> Result<Arc<LiveAttempt>, AppError> {
        self.get(quiz_id, session.user_id)
            .ok_or_else(|| AppError::NotFound("No attempt in progress for this quiz".to_string()))
    }

    /// Opens (or resumes) the student's attempt on a quiz.
    ///
    /// NotFound if the quiz is missing or inactive, Forbidden without a grant
    /// for its subject. A quiz without questions yields a `NotStarted` view.
    pub async fn load(&self, session: &Session, quiz_id: i64) -> Result<AttemptView, AppError> {
        session.require_student()?;
        let store = self.store.as_ref();

        let quiz = store
            .get_active_quiz(quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz is unavailable".to_string()))?;
        access::require_access(store, session, quiz.subject_id).await?;

        if let Some(live) = self.get(quiz_id, session.user_id) {
            let view = live.view().await;
            match view.phase {
                AttemptPhase::InProgress => return Ok(view),
                AttemptPhase::Submitted if view.result.is_none() => {
                    return Err(AppError::Conflict(
                        "The previous attempt has not been saved yet; submit it again".to_string(),
                    ));
                }
                _ => {}
            }
        }

        let questions = store.list_questions(quiz_id).await?;
        let prior = store.count_attempts(quiz_id, session.user_id).await?;
        let engine = AttemptEngine::open(quiz, questions, session.user_id, prior);
        let view = engine.view();

        if view.phase == AttemptPhase::NotStarted {
            tracing::info!(quiz_id, "Quiz opened with no questions available");
            return Ok(view);
        }

        let key = (quiz_id, session.user_id);
        let registry = Arc::downgrade(&self.registry);
        let live = LiveAttempt::new(engine);
        live.start_timer(self.store.clone(), self.tick, move |live, attempt| {
            if let Some(registry) = registry.upgrade() {
                registry.settle(key, live, attempt);
            }
        });
        self.registry.stored.remove(&key);
        // Replacing an older entry drops it, which stops its countdown.
        self.registry.live.insert(key, live);

        tracing::info!(
            quiz_id,
            student_id = session.user_id,
            attempt_number = view.attempt_number,
            "Quiz attempt started"
        );
        Ok(view)
    }

    pub async fn record_answer(
        &self,
        session: &Session,
        quiz_id: i64,
        req: &AnswerRequest,
    ) -> Result<AttemptView, AppError> {
        let live = self.require_live(session, quiz_id)?;
        live.record_answer(req.question_id, req.option_index).await
    }

    /// Submits the running attempt, or returns the stored record of the last one.
    pub async fn submit(&self, session: &Session, quiz_id: i64) -> Result<Attempt, AppError> {
        let key = (quiz_id, session.user_id);
        let Some(live) = self.get(quiz_id, session.user_id) else {
            return self
                .registry
                .stored
                .get(&key)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| {
                    AppError::NotFound("No attempt in progress for this quiz".to_string())
                });
        };

        let attempt = live.submit(self.store.as_ref()).await?;
        live.cancel_timer();
        self.registry.settle(key, &live, &attempt);
        Ok(attempt)
    }

    /// Drops the attempt and its countdown. Unsubmitted answers are discarded.
    pub fn abandon(&self, session: &Session, quiz_id: i64) -> bool {
        let key = (quiz_id, session.user_id);
        let stored = self.registry.stored.remove(&key).is_some();
        match self.registry.live.remove(&key) {
            Some((_, live)) => {
                live.cancel_timer();
                if !live.is_finished() {
                    tracing::info!(quiz_id, student_id = session.user_id, "Quiz attempt discarded");
                }
                true
            }
            None => stored,
        }
    }

    pub async fn history(&self, session: &Session, quiz_id: i64) -> Result<AttemptHistory, AppError> {
        let attempts = self.store.list_attempts(quiz_id, session.user_id).await?;
        Ok(AttemptHistory::from_attempts(quiz_id, attempts))
    }

    /// Attempts still holding an engine: running, or graded but not stored.
    pub fn live_count(&self) -> usize {
        self.registry.live.len()
    }
}
