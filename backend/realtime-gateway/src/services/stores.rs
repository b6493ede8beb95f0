//! Persistence seams used by the gateway.
//!
//! The gateway core only talks to these traits; the Mongo implementations
//! below are what `AppState` wires up in production and the integration
//! tests swap in in-memory ones.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::{self, doc, oid::ObjectId, Document};
use mongodb::{Collection, Database};

use crate::metrics::track_db_operation;
use crate::models::{Attempt, Quiz, User, UserIdentity};
use crate::utils::retry::{retry_async_with_config, RetryConfig};

#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn find_attempt(&self, attempt_id: &str) -> Result<Option<Attempt>>;

    /// Persists `answers` and `score` of an existing attempt
    async fn save_attempt(&self, attempt: &Attempt) -> Result<()>;
}

#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn find_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Active (not blocked) user by id
    async fn find_identity(&self, user_id: &str) -> Result<Option<UserIdentity>>;

    async fn touch_last_seen(&self, user_id: &str) -> Result<()>;
}

/// `_id` filter that accepts both ObjectId and plain string keys
fn id_filter(id: &str) -> Document {
    if let Ok(object_id) = ObjectId::parse_str(id) {
        doc! { "_id": object_id }
    } else {
        doc! { "_id": id }
    }
}

pub struct MongoAttemptStore {
    attempts: Collection<Attempt>,
}

impl MongoAttemptStore {
    pub fn new(db: &Database) -> Self {
        Self {
            attempts: db.collection("attempts"),
        }
    }
}

#[async_trait]
impl AttemptStore for MongoAttemptStore {
    async fn find_attempt(&self, attempt_id: &str) -> Result<Option<Attempt>> {
        let filter = id_filter(attempt_id);
        track_db_operation("find_one", "attempts", async {
            retry_async_with_config(RetryConfig::reads(), || async {
                self.attempts
                    .find_one(filter.clone())
                    .await
                    .context("Failed to query attempt")
            })
            .await
        })
        .await
    }

    async fn save_attempt(&self, attempt: &Attempt) -> Result<()> {
        let answers = bson::to_bson(&attempt.answers).context("Failed to encode answers")?;
        let update = doc! {
            "$set": {
                "answers": answers,
                "score": attempt.score,
                "updatedAt": bson::DateTime::from_millis(Utc::now().timestamp_millis()),
            }
        };
        let filter = id_filter(&attempt.id);

        let result = track_db_operation("update_one", "attempts", async {
            retry_async_with_config(RetryConfig::writes(), || async {
                self.attempts
                    .update_one(filter.clone(), update.clone())
                    .await
                    .context("Failed to update attempt")
            })
            .await
        })
        .await?;

        if result.matched_count == 0 {
            anyhow::bail!("Attempt {} disappeared before save", attempt.id);
        }
        Ok(())
    }
}

pub struct MongoQuizStore {
    quizzes: Collection<Quiz>,
}

impl MongoQuizStore {
    pub fn new(db: &Database) -> Self {
        Self {
            quizzes: db.collection("quizzes"),
        }
    }
}

#[async_trait]
impl QuizStore for MongoQuizStore {
    async fn find_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>> {
        let filter = id_filter(quiz_id);
        track_db_operation("find_one", "quizzes", async {
            retry_async_with_config(RetryConfig::reads(), || async {
                self.quizzes
                    .find_one(filter.clone())
                    .await
                    .context("Failed to query quiz")
            })
            .await
        })
        .await
    }
}

pub struct MongoUserDirectory {
    users: Collection<User>,
}

impl MongoUserDirectory {
    pub fn new(db: &Database) -> Self {
        Self {
            users: db.collection("users"),
        }
    }

    async fn load(&self, object_id: ObjectId) -> Result<Option<UserIdentity>> {
        let filter = doc! { "_id": object_id, "is_blocked": { "$ne": true } };
        let user = track_db_operation("find_one", "users", async {
            self.users
                .find_one(filter)
                .await
                .context("Failed to query user")
        })
        .await?;
        Ok(user.map(UserIdentity::from))
    }
}

#[async_trait]
impl UserDirectory for MongoUserDirectory {
    async fn find_identity(&self, user_id: &str) -> Result<Option<UserIdentity>> {
        let Ok(object_id) = ObjectId::parse_str(user_id) else {
            return Ok(None);
        };
        self.load(object_id).await
    }

    async fn touch_last_seen(&self, user_id: &str) -> Result<()> {
        let Ok(object_id) = ObjectId::parse_str(user_id) else {
            return Ok(());
        };
        let now = bson::DateTime::from_millis(Utc::now().timestamp_millis());

        track_db_operation("update_one", "users", async {
            self.users
                .update_one(doc! { "_id": object_id }, doc! { "$set": { "lastSeen": now } })
                .await
                .context("Failed to update lastSeen")
        })
        .await?;
        Ok(())
    }
}
