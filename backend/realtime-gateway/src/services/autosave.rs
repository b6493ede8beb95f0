//! Incremental answer autosave.
//!
//! Each `save_answer` frame is graded immediately and merged into the
//! attempt document. Saves for the same attempt are serialized in-process so
//! two sockets of one student cannot overwrite each other's answers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;

use crate::metrics::AUTOSAVE_TOTAL;
use crate::models::events::{AnswerSaved, ProgressDetail, SaveAnswerPayload, StudentProgress};
use crate::models::{AnswerRecord, Attempt, ServerEvent, SubmittedAnswer};

use super::dispatcher::BroadcastDispatcher;
use super::evaluator::{self, Evaluation};
use super::stores::{AttemptStore, QuizStore};

#[derive(Debug, thiserror::Error)]
pub enum AutosaveError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("attempt belongs to another student")]
    OwnershipViolation,
    #[error("attempt is no longer in progress")]
    AttemptClosed,
    #[error("persistence failure: {0:#}")]
    Persistence(anyhow::Error),
}

impl AutosaveError {
    fn outcome(&self) -> &'static str {
        match self {
            AutosaveError::NotFound(_) => "not_found",
            AutosaveError::OwnershipViolation => "ownership_violation",
            AutosaveError::AttemptClosed => "attempt_closed",
            AutosaveError::Persistence(_) => "persistence_error",
        }
    }
}

/// Per-attempt async mutexes, created on demand and dropped once idle
#[derive(Default)]
pub struct AttemptLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AttemptLocks {
    pub async fn acquire(&self, attempt_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks
                .entry(attempt_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Call after the guard is dropped
    pub fn release(&self, attempt_id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(attempt_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(attempt_id);
        }
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct AutosaveProcessor {
    attempts: Arc<dyn AttemptStore>,
    quizzes: Arc<dyn QuizStore>,
    dispatcher: BroadcastDispatcher,
    locks: AttemptLocks,
}

impl AutosaveProcessor {
    pub fn new(
        attempts: Arc<dyn AttemptStore>,
        quizzes: Arc<dyn QuizStore>,
        dispatcher: BroadcastDispatcher,
    ) -> Self {
        Self {
            attempts,
            quizzes,
            dispatcher,
            locks: AttemptLocks::default(),
        }
    }

    /// Grades and stores one answer. The originating connection gets an
    /// `answer_saved` ack and supervisors a `student_progress` event; every
    /// failure is swallowed and produces neither.
    pub async fn autosave(
        &self,
        origin_connection: &str,
        student_id: &str,
        payload: SaveAnswerPayload,
    ) -> Option<AnswerSaved> {
        let attempt_id = payload.attempt_id.clone();
        let guard = self.locks.acquire(&attempt_id).await;
        let result = self.process(student_id, payload).await;
        drop(guard);
        self.locks.release(&attempt_id);

        match result {
            Ok((ack, quiz_id)) => {
                AUTOSAVE_TOTAL.with_label_values(&["saved"]).inc();
                self.dispatcher
                    .to_connection(origin_connection, &ServerEvent::AnswerSaved(ack.clone()));
                self.dispatcher.to_quiz_supervisors(
                    &quiz_id,
                    &ServerEvent::StudentProgress(StudentProgress {
                        student_id: student_id.to_string(),
                        quiz_id: quiz_id.clone(),
                        detail: ProgressDetail::Answered {
                            question_id: ack.question_id.clone(),
                            is_correct: ack.is_correct,
                        },
                    }),
                );
                Some(ack)
            }
            Err(e) => {
                AUTOSAVE_TOTAL.with_label_values(&[e.outcome()]).inc();
                match e {
                    AutosaveError::Persistence(_) => {
                        tracing::error!(attempt_id = %attempt_id, student_id, "Autosave failed: {}", e)
                    }
                    AutosaveError::OwnershipViolation => {
                        tracing::warn!(attempt_id = %attempt_id, student_id, "Autosave rejected: {}", e)
                    }
                    _ => {
                        tracing::debug!(attempt_id = %attempt_id, student_id, "Autosave dropped: {}", e)
                    }
                }
                None
            }
        }
    }

    async fn process(
        &self,
        student_id: &str,
        payload: SaveAnswerPayload,
    ) -> Result<(AnswerSaved, String), AutosaveError> {
        let mut attempt = self
            .attempts
            .find_attempt(&payload.attempt_id)
            .await
            .map_err(AutosaveError::Persistence)?
            .ok_or(AutosaveError::NotFound("attempt"))?;

        if attempt.student_id != student_id {
            return Err(AutosaveError::OwnershipViolation);
        }
        if !attempt.is_in_progress() {
            return Err(AutosaveError::AttemptClosed);
        }

        let quiz = self
            .quizzes
            .find_quiz(&attempt.quiz_id)
            .await
            .map_err(AutosaveError::Persistence)?
            .ok_or(AutosaveError::NotFound("quiz"))?;
        let question = quiz
            .question(&payload.question_id)
            .ok_or(AutosaveError::NotFound("question"))?;

        let evaluation = evaluator::evaluate(question, &payload.answer);
        apply_answer(
            &mut attempt,
            &payload.question_id,
            payload.answer,
            evaluation,
            payload.time_spent,
            Utc::now(),
        );

        self.attempts
            .save_attempt(&attempt)
            .await
            .map_err(AutosaveError::Persistence)?;

        tracing::info!(
            attempt_id = %attempt.id,
            question_id = %payload.question_id,
            is_correct = evaluation.is_correct,
            score = attempt.score,
            "Answer autosaved"
        );

        Ok((
            AnswerSaved {
                attempt_id: attempt.id,
                question_id: payload.question_id,
                is_correct: evaluation.is_correct,
                points: evaluation.points,
                score: attempt.score,
            },
            attempt.quiz_id,
        ))
    }
}

/// Upserts the record for `question_id` and recomputes the score from scratch.
/// Time deltas accumulate; a negative or non-finite delta counts as zero.
pub fn apply_answer(
    attempt: &mut Attempt,
    question_id: &str,
    answer: SubmittedAnswer,
    evaluation: Evaluation,
    time_delta: f64,
    now: DateTime<Utc>,
) {
    let delta = if time_delta.is_finite() && time_delta > 0.0 {
        time_delta
    } else {
        0.0
    };

    match attempt.answer_for_mut(question_id) {
        Some(record) => {
            record.answer = answer;
            record.is_correct = evaluation.is_correct;
            record.points = evaluation.points;
            record.time_spent += delta;
            record.answered_at = now;
        }
        None => attempt.answers.push(AnswerRecord {
            question_id: question_id.to_string(),
            answer,
            is_correct: evaluation.is_correct,
            points: evaluation.points,
            time_spent: delta,
            answered_at: now,
        }),
    }

    attempt.score = evaluator::total_points(&attempt.answers);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttemptStatus;

    fn attempt() -> Attempt {
        Attempt {
            id: "att-1".into(),
            student_id: "stu-1".into(),
            quiz_id: "quiz-1".into(),
            status: AttemptStatus::InProgress,
            answers: Vec::new(),
            score: 0.0,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    fn graded(is_correct: bool, points: f64) -> Evaluation {
        Evaluation { is_correct, points }
    }

    #[test]
    fn upsert_replaces_answer_and_accumulates_time() {
        let mut attempt = attempt();
        let now = Utc::now();
        apply_answer(&mut attempt, "q1", SubmittedAnswer::Text("a".into()), graded(false, 0.0), 5.0, now);
        apply_answer(&mut attempt, "q1", SubmittedAnswer::Text("b".into()), graded(true, 2.0), 7.0, now);

        assert_eq!(attempt.answers.len(), 1);
        let record = attempt.answer_for("q1").unwrap();
        assert_eq!(record.answer, SubmittedAnswer::Text("b".into()));
        assert!(record.is_correct);
        assert_eq!(record.time_spent, 12.0);
        assert_eq!(attempt.score, 2.0);
    }

    #[test]
    fn score_is_recomputed_from_all_answers() {
        let mut attempt = attempt();
        attempt.score = 99.0;
        let now = Utc::now();
        apply_answer(&mut attempt, "q1", SubmittedAnswer::Boolean(true), graded(true, 1.0), 1.0, now);
        apply_answer(&mut attempt, "q2", SubmittedAnswer::Boolean(true), graded(true, 3.0), 1.0, now);
        assert_eq!(attempt.score, 4.0);
        assert_eq!(attempt.answer_for("q2").unwrap().points, 3.0);

        apply_answer(&mut attempt, "q2", SubmittedAnswer::Boolean(false), graded(false, 0.0), 1.0, now);
        assert_eq!(attempt.score, 1.0);
    }

    #[test]
    fn bogus_time_deltas_count_as_zero() {
        let mut attempt = attempt();
        let now = Utc::now();
        apply_answer(&mut attempt, "q1", SubmittedAnswer::Unknown, graded(false, 0.0), -4.0, now);
        apply_answer(&mut attempt, "q1", SubmittedAnswer::Unknown, graded(false, 0.0), f64::NAN, now);
        apply_answer(&mut attempt, "q1", SubmittedAnswer::Unknown, graded(false, 0.0), f64::INFINITY, now);
        assert_eq!(attempt.answers[0].time_spent, 0.0);
    }

    #[tokio::test]
    async fn idle_attempt_locks_are_released() {
        let locks = AttemptLocks::default();
        let guard = locks.acquire("att-1").await;
        assert_eq!(locks.len(), 1);
        drop(guard);
        locks.release("att-1");
        assert!(locks.is_empty());
    }
}
