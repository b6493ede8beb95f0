use serde::Deserialize;
use std::env;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8082";
const DEFAULT_USER_CACHE_TTL_SECONDS: u64 = 300;
const DEFAULT_OUTBOUND_BUFFER: usize = 64;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub redis_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub user_cache_ttl_seconds: u64,
    /// Per-connection outbound queue size; events beyond it are dropped
    pub outbound_buffer: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("JWT_SECRET must be set in production")]
    MissingProductionSecret,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        // Root .env (two levels up) first, then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml + APP__* overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mongo_uri = match settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
        {
            Ok(uri) => uri,
            Err(_) => {
                let user = env::var("MONGO_USER").map_err(|_| ConfigError::Missing("MONGO_USER"))?;
                let password = env::var("MONGO_PASSWORD")
                    .map_err(|_| ConfigError::Missing("MONGO_PASSWORD"))?;
                let db = env::var("MONGO_DB").unwrap_or_else(|_| "quizzes".to_string());
                tracing::warn!("Building MongoDB URI from MONGO_USER/MONGO_PASSWORD env vars");
                format!(
                    "mongodb://{}:{}@localhost:27017/{}?authSource=admin",
                    user, password, db
                )
            }
        };

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or_else(|_| {
                let host = env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
                let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
                match env::var("REDIS_PASSWORD") {
                    Ok(password) => format!("redis://:{}@{}:{}/0", password, host, port),
                    Err(_) => format!("redis://{}:{}/0", host, port),
                }
            });

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "quizzes".to_string());

        let jwt_secret = match settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) if app_env == "prod" => return Err(ConfigError::MissingProductionSecret),
            Err(_) => {
                tracing::warn!("Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let bind_addr = settings
            .get_string("gateway.bind_addr")
            .or_else(|_| env::var("GATEWAY_BIND_ADDR"))
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let user_cache_ttl_seconds = settings
            .get_int("gateway.user_cache_ttl_seconds")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .or_else(|| env_number("USER_CACHE_TTL_SECONDS"))
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_USER_CACHE_TTL_SECONDS);

        let outbound_buffer = settings
            .get_int("gateway.outbound_buffer")
            .ok()
            .and_then(|v| usize::try_from(v).ok())
            .or_else(|| env_number("WS_OUTBOUND_BUFFER"))
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_OUTBOUND_BUFFER);

        Ok(Config {
            mongo_uri,
            redis_uri,
            mongo_database,
            jwt_secret,
            bind_addr,
            user_cache_ttl_seconds,
            outbound_buffer,
        })
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_env() {
        for key in [
            "APP_ENV",
            "MONGO_URI",
            "JWT_SECRET",
            "GATEWAY_BIND_ADDR",
            "USER_CACHE_TTL_SECONDS",
            "WS_OUTBOUND_BUFFER",
        ] {
            env::remove_var(key);
        }
        env::set_var("SKIP_ROOT_ENV", "1");
    }

    #[test]
    #[serial_test::serial]
    fn load_uses_defaults_in_dev() {
        clear_env();
        env::set_var("MONGO_URI", "mongodb://localhost:27017");

        let config = Config::load().unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.user_cache_ttl_seconds, DEFAULT_USER_CACHE_TTL_SECONDS);
        assert_eq!(config.outbound_buffer, DEFAULT_OUTBOUND_BUFFER);
        assert_eq!(config.jwt_secret, "dev-secret-only-for-local-testing");
    }

    #[test]
    #[serial_test::serial]
    fn load_rejects_missing_secret_in_prod() {
        clear_env();
        env::set_var("MONGO_URI", "mongodb://localhost:27017");
        env::set_var("APP_ENV", "prod");

        let result = Config::load();
        assert!(matches!(result, Err(ConfigError::MissingProductionSecret)));
        env::remove_var("APP_ENV");
    }

    #[test]
    #[serial_test::serial]
    fn load_ignores_zero_buffer() {
        clear_env();
        env::set_var("MONGO_URI", "mongodb://localhost:27017");
        env::set_var("WS_OUTBOUND_BUFFER", "0");

        let config = Config::load().unwrap();
        assert_eq!(config.outbound_buffer, DEFAULT_OUTBOUND_BUFFER);
        env::remove_var("WS_OUTBOUND_BUFFER");
    }
}
