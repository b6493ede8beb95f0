//! Answer scoring shared by the autosave path and attempt completion.
//!
//! Everything here is pure: no I/O, no clock except the timestamps carried
//! in by callers. Malformed questions or answers grade as incorrect with zero
//! points and never return an error.

use std::collections::HashSet;

use crate::models::{AnswerRecord, AnswerType, Question, Quiz, SubmittedAnswer};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub is_correct: bool,
    pub points: f64,
}

impl Evaluation {
    fn graded(question: &Question, is_correct: bool) -> Self {
        Evaluation {
            is_correct,
            points: if is_correct { question.points } else { 0.0 },
        }
    }
}

pub fn evaluate(question: &Question, answer: &SubmittedAnswer) -> Evaluation {
    let is_correct = match question.answer_type {
        AnswerType::TextAnswer => text_matches(question, answer),
        AnswerType::SingleChoice | AnswerType::ImageSelection => single_matches(question, answer),
        AnswerType::MultipleChoice => set_matches(question, answer),
        AnswerType::TrueFalse => boolean_matches(question, answer),
        AnswerType::Unknown => false,
    };
    Evaluation::graded(question, is_correct)
}

fn text_matches(question: &Question, answer: &SubmittedAnswer) -> bool {
    let (SubmittedAnswer::Text(submitted), Some(expected)) =
        (answer, question.correct_answer_text.as_deref())
    else {
        return false;
    };
    let expected = expected.trim().to_lowercase();
    !expected.is_empty() && submitted.trim().to_lowercase() == expected
}

fn single_matches(question: &Question, answer: &SubmittedAnswer) -> bool {
    let Some(correct_id) = question.correct_option_ids().next() else {
        return false;
    };
    answer.as_scalar_string().as_deref() == Some(correct_id)
}

fn set_matches(question: &Question, answer: &SubmittedAnswer) -> bool {
    let correct: HashSet<&str> = question.correct_option_ids().collect();
    let submitted = answer.as_id_set();
    let submitted: HashSet<&str> = submitted.iter().map(String::as_str).collect();
    !correct.is_empty() && submitted == correct
}

fn boolean_matches(question: &Question, answer: &SubmittedAnswer) -> bool {
    match (answer.as_boolean(), question.correct_boolean) {
        (Some(submitted), Some(expected)) => submitted == expected,
        _ => false,
    }
}

/// Attempt score is always recomputed from scratch
pub fn total_points(answers: &[AnswerRecord]) -> f64 {
    answers.iter().map(|a| a.points).sum()
}

/// Re-grades stored answers against the current quiz. Answers whose question
/// no longer exists keep nothing: they are graded incorrect with zero points.
/// Returns the updated records and the new total score.
pub fn regrade(quiz: &Quiz, answers: &[AnswerRecord]) -> (Vec<AnswerRecord>, f64) {
    let regraded: Vec<AnswerRecord> = answers
        .iter()
        .map(|record| {
            let evaluation = quiz
                .question(&record.question_id)
                .map(|question| evaluate(question, &record.answer))
                .unwrap_or(Evaluation {
                    is_correct: false,
                    points: 0.0,
                });
            AnswerRecord {
                is_correct: evaluation.is_correct,
                points: evaluation.points,
                ..record.clone()
            }
        })
        .collect();
    let score = total_points(&regraded);
    (regraded, score)
}
