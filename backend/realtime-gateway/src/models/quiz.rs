use serde::{Deserialize, Serialize};

/// Quiz document from the "quizzes" collection, as far as scoring needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    #[serde(rename = "_id", with = "super::id_as_string")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.question_id == question_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question_id: String,
    pub answer_type: AnswerType,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_boolean: Option<bool>,
    #[serde(default)]
    pub points: f64,
}

impl Question {
    pub fn correct_option_ids(&self) -> impl Iterator<Item = &str> {
        self.options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.option_id.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    pub option_id: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// Question kinds. Anything unrecognized deserializes to `Unknown` and is
/// scored as incorrect instead of failing the whole quiz document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerType {
    SingleChoice,
    MultipleChoice,
    ImageSelection,
    TextAnswer,
    TrueFalse,
    #[serde(other)]
    Unknown,
}
