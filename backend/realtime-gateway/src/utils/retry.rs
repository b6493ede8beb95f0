use std::future::Future;
use std::time::Duration;

/// Backoff policy for transient storage failures
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::reads()
    }
}

impl RetryConfig {
    /// Lookups on the message path: fail fast, a client can resend
    pub fn reads() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(200),
            jitter_max: Some(Duration::from_millis(20)),
        }
    }

    /// Attempt writes: a lost write means a lost answer, so try harder
    pub fn writes() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(1000),
            jitter_max: Some(Duration::from_millis(100)),
        }
    }

    fn delay(&self, backoff: Duration) -> Duration {
        match self.jitter_max {
            Some(jitter_max) if !jitter_max.is_zero() => {
                let jitter_ms = jitter_max.as_millis() as u64;
                backoff + Duration::from_millis(rand::random::<u64>() % (jitter_ms + 1))
            }
            _ => backoff,
        }
    }
}

/// Runs `f` until it succeeds or `max_attempts` is exhausted, doubling the
/// backoff after each failure. The last error is returned.
pub async fn retry_async_with_config<F, Fut, T, E>(config: RetryConfig, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    let mut backoff = config.base_backoff;

    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt >= config.max_attempts => return Err(e),
            Err(e) => {
                tracing::debug!(attempt, max_attempts = config.max_attempts, "Retrying after error: {}", e);
                tokio::time::sleep(config.delay(backoff)).await;
                backoff = std::cmp::min(backoff * 2, config.max_backoff);
                attempt += 1;
            }
        }
    }
}
