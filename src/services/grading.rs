// src/services/grading.rs

//! Scoring of quiz answers. Pure functions, no storage.

use crate::models::{attempt::AnswerMap, question::Question};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub correct: i32,
    pub total: i32,
    /// 0..=100
    pub percent: i32,
}

/// Rounded percentage, halves rounding up.
pub fn percentage(correct: i32, total: i32) -> i32 {
    if total <= 0 {
        return 0;
    }
    (200 * correct + total) / (2 * total)
}

/// Keeps only answers that name a question of the quiz and a valid option.
pub fn valid_answers(questions: &[Question], answers: &AnswerMap) -> AnswerMap {
    questions
        .iter()
        .filter_map(|q| {
            answers
                .get(&q.id)
                .filter(|option| q.accepts(**option))
                .map(|option| (q.id, *option))
        })
        .collect()
}

/// Every question counts towards the total; unanswered or invalid ones are wrong.
pub fn score(questions: &[Question], answers: &AnswerMap) -> Score {
    let correct = questions
        .iter()
        .filter(|q| answers.get(&q.id) == Some(&q.correct_answer))
        .count() as i32;
    let total = questions.len() as i32;

    Score {
        correct,
        total,
        percent: percentage(correct, total),
    }
}

pub fn passed(percent: i32, passing_score: i32) -> bool {
    percent >= passing_score
}
