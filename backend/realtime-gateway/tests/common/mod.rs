#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use quiz_realtime_gateway::config::Config;
use quiz_realtime_gateway::middlewares::auth::JwtClaims;
use quiz_realtime_gateway::models::{
    Attempt, AttemptStatus, Quiz, ServerEvent, UserIdentity, UserRole,
};
use quiz_realtime_gateway::services::gateway::Session;
use quiz_realtime_gateway::services::stores::{AttemptStore, QuizStore, UserDirectory};
use quiz_realtime_gateway::services::{AppState, Stores};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub const JWT_SECRET: &str = "integration-test-secret";

pub fn test_config() -> Config {
    Config {
        mongo_uri: "mongodb://localhost:27017".to_string(),
        redis_uri: "redis://localhost:6379".to_string(),
        mongo_database: "quiz_gateway_test".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        user_cache_ttl_seconds: 60,
        outbound_buffer: 64,
    }
}

#[derive(Default)]
pub struct MemoryAttempts {
    attempts: Mutex<HashMap<String, Attempt>>,
    pub fail_writes: AtomicBool,
    pub writes: AtomicUsize,
}

impl MemoryAttempts {
    pub fn insert(&self, attempt: Attempt) {
        self.attempts
            .lock()
            .unwrap()
            .insert(attempt.id.clone(), attempt);
    }

    pub fn get(&self, attempt_id: &str) -> Attempt {
        self.attempts.lock().unwrap()[attempt_id].clone()
    }
}

#[async_trait]
impl AttemptStore for MemoryAttempts {
    async fn find_attempt(&self, attempt_id: &str) -> anyhow::Result<Option<Attempt>> {
        Ok(self.attempts.lock().unwrap().get(attempt_id).cloned())
    }

    async fn save_attempt(&self, attempt: &Attempt) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("simulated write failure");
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.insert(attempt.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryQuizzes {
    quizzes: Mutex<HashMap<String, Quiz>>,
}

impl MemoryQuizzes {
    pub fn insert(&self, quiz: Quiz) {
        self.quizzes.lock().unwrap().insert(quiz.id.clone(), quiz);
    }
}

#[async_trait]
impl QuizStore for MemoryQuizzes {
    async fn find_quiz(&self, quiz_id: &str) -> anyhow::Result<Option<Quiz>> {
        Ok(self.quizzes.lock().unwrap().get(quiz_id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryUsers {
    users: Mutex<HashMap<String, UserIdentity>>,
    pub last_seen_touches: Mutex<Vec<String>>,
}

impl MemoryUsers {
    pub fn insert(&self, identity: UserIdentity) {
        self.users
            .lock()
            .unwrap()
            .insert(identity.user_id.clone(), identity);
    }

    pub fn touches_for(&self, user_id: &str) -> usize {
        self.last_seen_touches
            .lock()
            .unwrap()
            .iter()
            .filter(|id| id.as_str() == user_id)
            .count()
    }
}

#[async_trait]
impl UserDirectory for MemoryUsers {
    async fn find_identity(&self, user_id: &str) -> anyhow::Result<Option<UserIdentity>> {
        Ok(self.users.lock().unwrap().get(user_id).cloned())
    }

    async fn touch_last_seen(&self, user_id: &str) -> anyhow::Result<()> {
        self.last_seen_touches
            .lock()
            .unwrap()
            .push(user_id.to_string());
        Ok(())
    }
}

/// Gateway wired to in-memory stores
pub struct Harness {
    pub state: Arc<AppState>,
    pub attempts: Arc<MemoryAttempts>,
    pub quizzes: Arc<MemoryQuizzes>,
    pub users: Arc<MemoryUsers>,
    next_connection: AtomicUsize,
}

/// One simulated socket: the session plus its outbound queue
pub struct TestClient {
    pub session: Session,
    pub rx: mpsc::Receiver<Arc<String>>,
}

impl TestClient {
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(raw) = self.rx.try_recv() {
            events.push(serde_json::from_str(&raw).expect("server frame must parse"));
        }
        events
    }

    pub fn drain_named(&mut self, name: &str) -> Vec<ServerEvent> {
        self.drain()
            .into_iter()
            .filter(|e| e.name() == name)
            .collect()
    }
}

impl Harness {
    pub fn new() -> Self {
        let attempts = Arc::new(MemoryAttempts::default());
        let quizzes = Arc::new(MemoryQuizzes::default());
        let users = Arc::new(MemoryUsers::default());

        let state = Arc::new(AppState::with_stores(
            test_config(),
            Stores {
                attempts: attempts.clone(),
                quizzes: quizzes.clone(),
                users: users.clone(),
            },
        ));

        Self {
            state,
            attempts,
            quizzes,
            users,
            next_connection: AtomicUsize::new(1),
        }
    }

    pub fn add_user(&self, user_id: &str, role: UserRole) -> UserIdentity {
        let identity = UserIdentity {
            user_id: user_id.to_string(),
            name: format!("{} {}", role, user_id),
            role,
        };
        self.users.insert(identity.clone());
        identity
    }

    /// Authenticated and activated connection for `identity`
    pub fn connect(&self, identity: &UserIdentity) -> TestClient {
        let n = self.next_connection.fetch_add(1, Ordering::SeqCst);
        let mut session = Session::new(format!("conn-{}", n), identity.clone());
        let (tx, rx) = self.state.gateway.outbound_channel();
        self.state.gateway.connect(&mut session, tx);
        TestClient { session, rx }
    }

    pub fn disconnect(&self, client: &mut TestClient) {
        self.state.gateway.disconnect(&mut client.session);
    }

    pub fn token_for(&self, user_id: &str, role: &str) -> String {
        let now = Utc::now().timestamp() as usize;
        self.state
            .jwt
            .generate_token(JwtClaims {
                sub: user_id.to_string(),
                role: role.to_string(),
                exp: now + 3600,
                iat: now,
            })
            .expect("token generation")
    }
}

/// Quiz with one question of every scored kind
pub fn sample_quiz(quiz_id: &str) -> Quiz {
    serde_json::from_value(json!({
        "_id": quiz_id,
        "title": "Geography basics",
        "questions": [
            {
                "questionId": "q-single",
                "answerType": "single-choice",
                "points": 5,
                "options": [
                    { "optionId": "1", "isCorrect": false },
                    { "optionId": "2", "isCorrect": true },
                    { "optionId": "3", "isCorrect": false }
                ]
            },
            {
                "questionId": "q-multi",
                "answerType": "multiple-choice",
                "points": 3,
                "options": [
                    { "optionId": "a", "isCorrect": true },
                    { "optionId": "b", "isCorrect": false },
                    { "optionId": "c", "isCorrect": true }
                ]
            },
            {
                "questionId": "q-text",
                "answerType": "text-answer",
                "points": 2,
                "correctAnswerText": "Paris"
            },
            {
                "questionId": "q-bool",
                "answerType": "true-false",
                "points": 1,
                "correctBoolean": true
            }
        ]
    }))
    .expect("sample quiz must deserialize")
}

pub fn in_progress_attempt(attempt_id: &str, student_id: &str, quiz_id: &str) -> Attempt {
    Attempt {
        id: attempt_id.to_string(),
        student_id: student_id.to_string(),
        quiz_id: quiz_id.to_string(),
        status: AttemptStatus::InProgress,
        answers: Vec::new(),
        score: 0.0,
        started_at: Utc::now(),
        completed_at: None,
    }
}
