use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::answer::SubmittedAnswer;
use super::user::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

/// Quiz attempt document from the "attempts" collection.
///
/// `student_id` never changes after creation, `answers` holds at most one
/// record per question and `score` always equals the sum of answer points.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    #[serde(rename = "_id", with = "super::id_as_string")]
    pub id: String,
    #[serde(with = "super::id_as_string")]
    pub student_id: String,
    #[serde(with = "super::id_as_string")]
    pub quiz_id: String,
    pub status: AttemptStatus,
    #[serde(default)]
    pub answers: Vec<AnswerRecord>,
    #[serde(default)]
    pub score: f64,
    #[serde(with = "bson_datetime_as_chrono")]
    pub started_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    TimedOut,
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: String,
    #[serde(default)]
    pub answer: SubmittedAnswer,
    pub is_correct: bool,
    pub points: f64,
    /// Cumulative seconds over every autosave of this question
    #[serde(default)]
    pub time_spent: f64,
    #[serde(with = "bson_datetime_as_chrono")]
    pub answered_at: DateTime<Utc>,
}

impl Attempt {
    pub fn is_in_progress(&self) -> bool {
        self.status == AttemptStatus::InProgress
    }

    pub fn answer_for(&self, question_id: &str) -> Option<&AnswerRecord> {
        self.answers.iter().find(|a| a.question_id == question_id)
    }

    pub fn answer_for_mut(&mut self, question_id: &str) -> Option<&mut AnswerRecord> {
        self.answers.iter_mut().find(|a| a.question_id == question_id)
    }
}
