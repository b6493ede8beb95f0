use std::sync::Arc;

use crate::config::Config;
use crate::middlewares::auth::JwtService;
use mongodb::{Client as MongoClient, Database};
use redis::aio::ConnectionManager;

use self::authenticator::TokenAuthenticator;
use self::autosave::AutosaveProcessor;
use self::dispatcher::BroadcastDispatcher;
use self::gateway::SessionGateway;
use self::presence::PresenceRegistry;
use self::rooms::RoomRouter;
use self::stores::{
    AttemptStore, MongoAttemptStore, MongoQuizStore, MongoUserDirectory, QuizStore, UserDirectory,
};
use self::user_cache::{CachedUserDirectory, UserCache};

pub struct AppState {
    pub config: Config,
    /// `None` when the state is assembled from in-memory stores
    pub mongo: Option<Database>,
    pub redis: Option<ConnectionManager>,
    pub jwt: JwtService,
    pub dispatcher: BroadcastDispatcher,
    pub presence: Arc<PresenceRegistry>,
    pub gateway: SessionGateway,
}

/// Storage backends the gateway core runs against
pub struct Stores {
    pub attempts: Arc<dyn AttemptStore>,
    pub quizzes: Arc<dyn QuizStore>,
    pub users: Arc<dyn UserDirectory>,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        tracing::info!("Attempting to connect to Redis...");

        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        tracing::info!("Redis ConnectionManager created, testing with PING...");

        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        let cache = UserCache::new(redis.clone(), config.user_cache_ttl_seconds);
        let users = CachedUserDirectory::new(
            Arc::new(MongoUserDirectory::new(&mongo)),
            Arc::new(cache),
        );
        let stores = Stores {
            attempts: Arc::new(MongoAttemptStore::new(&mongo)),
            quizzes: Arc::new(MongoQuizStore::new(&mongo)),
            users: Arc::new(users),
        };

        let mut state = Self::with_stores(config, stores);
        state.mongo = Some(mongo);
        state.redis = Some(redis);
        Ok(state)
    }

    /// Wires the gateway components around the given stores
    pub fn with_stores(config: Config, stores: Stores) -> Self {
        let jwt = JwtService::new(&config.jwt_secret);
        let dispatcher = BroadcastDispatcher::new(Arc::new(RoomRouter::new()));
        let presence = Arc::new(PresenceRegistry::new(dispatcher.clone()));
        let autosave = Arc::new(AutosaveProcessor::new(
            stores.attempts,
            stores.quizzes,
            dispatcher.clone(),
        ));
        let authenticator = TokenAuthenticator::new(jwt.clone(), stores.users);
        let gateway = SessionGateway::new(
            authenticator,
            presence.clone(),
            dispatcher.clone(),
            autosave,
            config.outbound_buffer,
        );

        Self {
            config,
            mongo: None,
            redis: None,
            jwt,
            dispatcher,
            presence,
            gateway,
        }
    }
}

pub mod authenticator;
pub mod autosave;
pub mod dispatcher;
pub mod evaluator;
pub mod gateway;
pub mod presence;
pub mod rooms;
pub mod stores;
pub mod user_cache;
