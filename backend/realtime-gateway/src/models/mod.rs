pub mod answer;
pub mod attempt;
pub mod events;
pub mod notification;
pub mod quiz;
pub mod user;

pub use answer::SubmittedAnswer;
pub use attempt::{AnswerRecord, Attempt, AttemptStatus};
pub use events::{ClientEvent, ServerEvent};
pub use quiz::{AnswerType, Question, QuestionOption, Quiz};
pub use user::{PublicUser, User, UserIdentity, UserRole};

/// Reads `_id`-like fields stored either as ObjectId or as plain string
pub(crate) mod id_as_string {
    use mongodb::bson::Bson;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(id: &str, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(id)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Bson::deserialize(deserializer)? {
            Bson::ObjectId(oid) => Ok(oid.to_hex()),
            Bson::String(s) => Ok(s),
            other => Err(serde::de::Error::custom(format!(
                "unsupported id type: {:?}",
                other.element_type()
            ))),
        }
    }
}
