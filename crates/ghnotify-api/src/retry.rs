// Retry logic with exponential backoff, for rate limits only
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::error::{classify, ApiError, ErrorKind, Result};
use crate::transport::GraphQlTransport;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Budget for the whole attempt sequence, backoff waits included
    pub timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 2000, // 2s, 4s, 8s
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            timeout_ms: 30000,
        }
    }
}

impl RetryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Execute an API call, retrying only when GitHub says we're going too fast.
///
/// Retrying a 404 or a permission error can't help, so anything not
/// classified as [`ErrorKind::RateLimit`] is returned straight away.
/// The deadline starts with the first attempt; running out of it (during
/// a call or while backing off) yields [`ApiError::Timeout`].
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let budget = config.timeout();
    let deadline = Instant::now() + budget;
    let mut attempt = 0;
    let mut delay_ms = config.initial_delay_ms;

    loop {
        let outcome = match timeout_at(deadline, operation()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(timeout_ms = config.timeout_ms, attempt = attempt + 1, "API call timed out");
                return Err(ApiError::Timeout(budget));
            }
        };

        let err = match outcome {
            Ok(result) => {
                if attempt > 0 {
                    info!(attempts = attempt + 1, "Request succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => err,
        };

        let kind = classify(&err);
        if kind != ErrorKind::RateLimit {
            debug!(error_kind = %kind, error = %err, "Not retrying");
            return Err(err);
        }

        if attempt >= config.max_retries {
            warn!(retries = config.max_retries, error = %err, "Giving up after rate limit retries");
            return Err(ApiError::RetriesExhausted {
                retries: config.max_retries,
                source: Box::new(err),
            });
        }

        attempt += 1;
        warn!(
            attempt,
            max_retries = config.max_retries,
            backoff_ms = delay_ms,
            error = %err,
            "Rate limit hit, retrying with backoff"
        );

        if timeout_at(deadline, sleep(Duration::from_millis(delay_ms)))
            .await
            .is_err()
        {
            warn!(timeout_ms = config.timeout_ms, "Deadline reached while waiting to retry");
            return Err(ApiError::Timeout(budget));
        }

        delay_ms = ((delay_ms as f64) * config.backoff_multiplier) as u64;
        delay_ms = delay_ms.min(config.max_delay_ms);
    }
}

/// Wraps a GraphQL transport so every query goes through [`with_retry`]
pub struct ResilientTransport<T> {
    inner: T,
    config: RetryConfig,
}

impl<T> ResilientTransport<T> {
    pub fn new(inner: T, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl<T: GraphQlTransport> GraphQlTransport for ResilientTransport<T> {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value> {
        with_retry(&self.config, || self.inner.execute(query, variables.clone())).await
    }
}
