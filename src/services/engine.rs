// src/services/engine.rs

//! In-memory state of one student's run through a quiz.
//!
//! `NotStarted -> InProgress -> Submitted`. The engine never touches storage;
//! `LiveAttempt` drives it and persists the graded result.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{AnswerMap, Attempt, AttemptPhase, AttemptView, GradedAttempt},
        question::{PublicQuestion, Question},
        quiz::Quiz,
    },
    services::grading,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Seconds left after this tick.
    Running(i64),
    /// The countdown just reached zero. Returned once per attempt.
    Expired,
    /// Nothing to count down.
    Idle,
}

#[derive(Debug)]
pub struct AttemptEngine {
    quiz: Quiz,
    questions: Vec<Question>,
    student_id: i64,
    answers: AnswerMap,
    remaining_seconds: i64,
    next_attempt_number: i32,
    phase: AttemptPhase,
    graded: Option<GradedAttempt>,
    saved: Option<Attempt>,
}

impl AttemptEngine {
    /// Opens an attempt. Without questions the engine stays `NotStarted`.
    pub fn open(quiz: Quiz, questions: Vec<Question>, student_id: i64, prior_attempts: i64) -> Self {
        let phase = if questions.is_empty() {
            AttemptPhase::NotStarted
        } else {
            AttemptPhase::InProgress
        };
        let remaining_seconds = quiz.time_limit_seconds();

        AttemptEngine {
            quiz,
            questions,
            student_id,
            answers: AnswerMap::new(),
            remaining_seconds,
            next_attempt_number: prior_attempts as i32 + 1,
            phase,
            graded: None,
            saved: None,
        }
    }

    pub fn phase(&self) -> AttemptPhase {
        self.phase
    }

    pub fn remaining_seconds(&self) -> i64 {
        self.remaining_seconds
    }

    pub fn saved(&self) -> Option<&Attempt> {
        self.saved.as_ref()
    }

    /// Overwrites any earlier answer for the question. The option index is
    /// not range-checked here; invalid picks are discarded when grading.
    pub fn record_answer(&mut self, question_id: i64, option_index: i32) -> Result<(), AppError> {
        match self.phase {
            AttemptPhase::InProgress => {}
            AttemptPhase::NotStarted => {
                return Err(AppError::Conflict(
                    "This quiz has no questions available".to_string(),
                ));
            }
            AttemptPhase::Submitted => {
                return Err(AppError::Conflict(
                    "This attempt has already been submitted".to_string(),
                ));
            }
        }

        if !self.questions.iter().any(|q| q.id == question_id) {
            return Err(AppError::NotFound(format!(
                "Question {} is not part of this quiz",
                question_id
            )));
        }

        self.answers.insert(question_id, option_index);
        Ok(())
    }

    pub fn tick(&mut self) -> Tick {
        if self.phase != AttemptPhase::InProgress || self.remaining_seconds <= 0 {
            return Tick::Idle;
        }

        self.remaining_seconds -= 1;
        if self.remaining_seconds == 0 {
            Tick::Expired
        } else {
            Tick::Running(self.remaining_seconds)
        }
    }

    /// Freezes the answers and computes the result.
    ///
    /// The first call moves the engine to `Submitted`; later calls return the
    /// same graded attempt (same id and timestamp) so a failed write can be
    /// retried without the answers.
    pub fn grade(&mut self, now: DateTime<Utc>) -> Result<GradedAttempt, AppError> {
        match self.phase {
            AttemptPhase::NotStarted => Err(AppError::Conflict(
                "This quiz has no questions available".to_string(),
            )),
            AttemptPhase::Submitted => self.graded.clone().ok_or_else(|| {
                AppError::InternalServerError("submitted attempt without a result".to_string())
            }),
            AttemptPhase::InProgress => {
                let answers = grading::valid_answers(&self.questions, &self.answers);
                let score = grading::score(&self.questions, &answers);
                let elapsed = (self.quiz.time_limit_seconds() - self.remaining_seconds).max(0);

                let graded = GradedAttempt {
                    id: Uuid::new_v4(),
                    quiz_id: self.quiz.id,
                    student_id: self.student_id,
                    answers,
                    score: score.percent,
                    correct_count: score.correct,
                    total_questions: score.total,
                    passed: grading::passed(score.percent, self.quiz.passing_score),
                    elapsed_seconds: elapsed as i32,
                    submitted_at: now,
                };

                self.phase = AttemptPhase::Submitted;
                self.graded = Some(graded.clone());
                Ok(graded)
            }
        }
    }

    pub fn mark_saved(&mut self, attempt: Attempt) {
        self.saved = Some(attempt);
    }

    pub fn view(&self) -> AttemptView {
        AttemptView {
            quiz_id: self.quiz.id,
            title: self.quiz.title.clone(),
            time_limit_minutes: self.quiz.time_limit_minutes,
            passing_score: self.quiz.passing_score,
            phase: self.phase,
            questions: self.questions.iter().map(PublicQuestion::from).collect(),
            answers: self.answers.clone(),
            remaining_seconds: self.remaining_seconds,
            attempt_number: self
                .saved
                .as_ref()
                .map(|a| a.attempt_number)
                .unwrap_or(self.next_attempt_number),
            result: self.saved.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    fn quiz(minutes: i32, passing: i32) -> Quiz {
        Quiz {
            id: 10,
            subject_id: 1,
            title: "Fractions".into(),
            description: None,
            time_limit_minutes: minutes,
            passing_score: passing,
            is_active: true,
            created_at: None,
        }
    }

    fn questions(correct: &[i32]) -> Vec<Question> {
        correct
            .iter()
            .enumerate()
            .map(|(i, c)| Question {
                id: 100 + i as i64,
                quiz_id: 10,
                question_text: format!("Q{}", i),
                options: Json(vec!["a".into(), "b".into(), "c".into(), "d".into()]),
                correct_answer: *c,
                sort_order: i as i32,
            })
            .collect()
    }

    #[test]
    fn test_open_without_questions_stays_not_started() {
        let mut engine = AttemptEngine::open(quiz(5, 50), vec![], 1, 0);
        assert_eq!(engine.phase(), AttemptPhase::NotStarted);
        assert_eq!(engine.tick(), Tick::Idle);
        assert!(matches!(
            engine.record_answer(1, 0),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(engine.grade(Utc::now()), Err(AppError::Conflict(_))));
    }

    #[test]
    fn test_scenario_75_percent() {
        let mut engine = AttemptEngine::open(quiz(10, 70), questions(&[0, 1, 2, 3]), 1, 0);
        for (qid, pick) in [(100, 0), (101, 1), (102, 2), (103, 1)] {
            engine.record_answer(qid, pick).unwrap();
        }
        let graded = engine.grade(Utc::now()).unwrap();
        assert_eq!(graded.score, 75);
        assert_eq!(graded.correct_count, 3);
        assert!(graded.passed);
        assert_eq!(engine.phase(), AttemptPhase::Submitted);
    }

    #[test]
    fn test_last_answer_wins() {
        let mut engine = AttemptEngine::open(quiz(10, 50), questions(&[2]), 1, 0);
        engine.record_answer(100, 0).unwrap();
        engine.record_answer(100, 2).unwrap();
        assert_eq!(engine.grade(Utc::now()).unwrap().score, 100);
    }

    #[test]
    fn test_unknown_question_rejected() {
        let mut engine = AttemptEngine::open(quiz(10, 50), questions(&[0]), 1, 0);
        assert!(matches!(
            engine.record_answer(999, 0),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_out_of_range_pick_counts_as_wrong() {
        let mut engine = AttemptEngine::open(quiz(10, 50), questions(&[0, 0]), 1, 0);
        engine.record_answer(100, 0).unwrap();
        engine.record_answer(101, 7).unwrap();
        let graded = engine.grade(Utc::now()).unwrap();
        assert_eq!(graded.score, 50);
        assert_eq!(graded.answers.len(), 1);
    }

    #[test]
    fn test_grade_twice_returns_same_result() {
        let mut engine = AttemptEngine::open(quiz(10, 50), questions(&[0]), 1, 2);
        engine.record_answer(100, 0).unwrap();
        let first = engine.grade(Utc::now()).unwrap();
        let second = engine.grade(Utc::now()).unwrap();
        assert_eq!(first, second);
        assert!(matches!(
            engine.record_answer(100, 1),
            Err(AppError::Conflict(_))
        ));
        assert_eq!(engine.view().attempt_number, 3);
    }

    #[test]
    fn test_countdown_expires_exactly_once() {
        let mut engine = AttemptEngine::open(quiz(1, 50), questions(&[0]), 1, 0);
        let mut expired = 0;
        for _ in 0..200 {
            match engine.tick() {
                Tick::Expired => expired += 1,
                Tick::Running(left) => assert!(left > 0),
                Tick::Idle => {}
            }
        }
        assert_eq!(expired, 1);
        assert_eq!(engine.remaining_seconds(), 0);
    }

    #[test]
    fn test_expiry_with_no_answers_scores_zero() {
        let mut engine = AttemptEngine::open(quiz(1, 50), questions(&[0, 1, 2]), 1, 0);
        while engine.tick() != Tick::Expired {}
        let graded = engine.grade(Utc::now()).unwrap();
        assert_eq!(graded.score, 0);
        assert!(!graded.passed);
        assert_eq!(graded.elapsed_seconds, 60);
    }

    #[test]
    fn test_elapsed_tracks_ticks() {
        let mut engine = AttemptEngine::open(quiz(2, 50), questions(&[0]), 1, 0);
        for _ in 0..15 {
            engine.tick();
        }
        assert_eq!(engine.remaining_seconds(), 105);
        assert_eq!(engine.grade(Utc::now()).unwrap().elapsed_seconds, 15);
        assert_eq!(engine.tick(), Tick::Idle);
    }

    #[test]
    fn test_view_hides_correct_answers() {
        let engine = AttemptEngine::open(quiz(2, 50), questions(&[3]), 1, 0);
        let json = serde_json::to_value(engine.view()).unwrap();
        assert!(json["questions"][0].get("correct_answer").is_none());
        assert_eq!(json["phase"], "in_progress");
    }
}
