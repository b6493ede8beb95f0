use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};

/// Answer payload as submitted by a client, normalized at the boundary.
///
/// Clients send whatever the question widget produced: a string, a number,
/// a list of option ids or a boolean. Every other shape is kept as `Unknown`
/// so that scoring can fail closed instead of rejecting the message.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SubmittedAnswer {
    Text(String),
    SingleId(Number),
    IdSet(Vec<String>),
    Boolean(bool),
    #[default]
    Unknown,
}

impl SubmittedAnswer {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(s) => SubmittedAnswer::Text(s),
            Value::Number(n) => SubmittedAnswer::SingleId(n),
            Value::Bool(b) => SubmittedAnswer::Boolean(b),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
                .map(SubmittedAnswer::IdSet)
                .unwrap_or(SubmittedAnswer::Unknown),
            Value::Null | Value::Object(_) => SubmittedAnswer::Unknown,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            SubmittedAnswer::Text(s) => Value::String(s.clone()),
            SubmittedAnswer::SingleId(n) => Value::Number(n.clone()),
            SubmittedAnswer::IdSet(ids) => {
                Value::Array(ids.iter().cloned().map(Value::String).collect())
            }
            SubmittedAnswer::Boolean(b) => Value::Bool(*b),
            SubmittedAnswer::Unknown => Value::Null,
        }
    }

    /// Scalar string form used by single-choice style questions
    pub fn as_scalar_string(&self) -> Option<String> {
        match self {
            SubmittedAnswer::Text(s) => Some(s.clone()),
            SubmittedAnswer::SingleId(n) => Some(n.to_string()),
            SubmittedAnswer::Boolean(b) => Some(b.to_string()),
            SubmittedAnswer::IdSet(ids) => Some(ids.join(",")),
            SubmittedAnswer::Unknown => None,
        }
    }

    /// Set form used by multiple-choice questions; scalars become singletons
    pub fn as_id_set(&self) -> Vec<String> {
        match self {
            SubmittedAnswer::IdSet(ids) => ids.clone(),
            SubmittedAnswer::Unknown => Vec::new(),
            scalar => scalar.as_scalar_string().into_iter().collect(),
        }
    }

    /// `None` means indeterminate
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            SubmittedAnswer::Boolean(b) => Some(*b),
            SubmittedAnswer::Text(s) if s.eq_ignore_ascii_case("true") => Some(true),
            SubmittedAnswer::Text(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }
}

impl Serialize for SubmittedAnswer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SubmittedAnswer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(SubmittedAnswer::from_value(Value::deserialize(deserializer)?))
    }
}
