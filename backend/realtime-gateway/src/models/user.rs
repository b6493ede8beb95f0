use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// User record stored in MongoDB "users" collection.
///
/// Only the fields the gateway reads are modeled; profile CRUD lives elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: UserRole,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(
        rename = "lastSeen",
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub last_seen: Option<DateTime<Utc>>,
}

// Serde converters for chrono::DateTime <-> mongodb::bson::DateTime
pub(crate) mod bson_datetime_as_chrono {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bson_dt = bson::DateTime::from_millis(date.timestamp_millis());
        bson_dt.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bson_dt = bson::DateTime::deserialize(deserializer)?;
        DateTime::from_timestamp_millis(bson_dt.timestamp_millis())
            .ok_or_else(|| serde::de::Error::custom("timestamp out of range"))
    }
}

pub(crate) mod bson_datetime_as_chrono_option {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => {
                let bson_dt = bson::DateTime::from_millis(d.timestamp_millis());
                serializer.serialize_some(&bson_dt)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt_bson_dt: Option<bson::DateTime> = Option::deserialize(deserializer)?;
        Ok(opt_bson_dt.and_then(|bson_dt| DateTime::from_timestamp_millis(bson_dt.timestamp_millis())))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Student,
    Teacher,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Teacher => "teacher",
            UserRole::Admin => "admin",
        }
    }

    /// Teachers and admins receive progress/activity broadcasts about students
    pub fn is_supervisor(&self) -> bool {
        matches!(self, UserRole::Teacher | UserRole::Admin)
    }

    pub const SUPERVISORS: [UserRole; 2] = [UserRole::Admin, UserRole::Teacher];
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved identity of an authenticated connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub user_id: String,
    pub name: String,
    pub role: UserRole,
}

impl From<User> for UserIdentity {
    fn from(user: User) -> Self {
        UserIdentity {
            user_id: user.id.to_hex(),
            name: user.name,
            role: user.role,
        }
    }
}

/// Public projection broadcast to other clients (no email, no timestamps)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub role: UserRole,
}

impl From<&UserIdentity> for PublicUser {
    fn from(identity: &UserIdentity) -> Self {
        PublicUser {
            id: identity.user_id.clone(),
            name: identity.name.clone(),
            role: identity.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&UserRole::Teacher).unwrap(), "\"teacher\"");
        let role: UserRole = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, UserRole::Admin);
    }

    #[test]
    fn supervisors_are_teacher_and_admin() {
        assert!(UserRole::Teacher.is_supervisor());
        assert!(UserRole::Admin.is_supervisor());
        assert!(!UserRole::Student.is_supervisor());
    }

    #[test]
    fn identity_from_user_uses_hex_id() {
        let oid = ObjectId::new();
        let user = User {
            id: oid,
            name: "Ada".to_string(),
            email: None,
            role: UserRole::Student,
            is_blocked: false,
            last_seen: None,
        };
        let identity = UserIdentity::from(user);
        assert_eq!(identity.user_id, oid.to_hex());
        assert_eq!(PublicUser::from(&identity).name, "Ada");
    }
}
