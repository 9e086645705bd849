use log::{debug, info, warn};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Status code the bot list uses to signal rate limiting.
pub const RATE_LIMITED: u16 = 429;

#[derive(Debug, Clone, Error)]
pub enum InfinityError {
    /// The service answered with a non-200 status
    #[error("{message}")]
    Api { message: String, status: u16 },

    /// The request never produced a response (DNS, TLS, connect, timeout)
    #[error("{0}")]
    Transport(String),

    /// A 200 response whose body could not be decoded
    #[error("Parse Error: {0}")]
    ParseError(String),

    /// Missing or malformed client configuration
    #[error("Config Error: {0}")]
    ConfigError(String),

    /// The blocking client was driven from an unsuitable context
    #[error("Runtime Error: {0}")]
    RuntimeError(String),
}

impl From<reqwest::Error> for InfinityError {
    fn from(err: reqwest::Error) -> Self {
        InfinityError::Transport(format!("Request failed: {}", err))
    }
}

impl From<serde_json::Error> for InfinityError {
    fn from(err: serde_json::Error) -> Self {
        InfinityError::ParseError(format!("JSON serialization/deserialization error: {}", err))
    }
}

impl InfinityError {
    pub fn api(message: impl Into<String>, status: u16) -> Self {
        InfinityError::Api {
            message: message.into(),
            status,
        }
    }

    /// HTTP status of the failed response. `None` means the failure happened
    /// before the service answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            InfinityError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status_code() == Some(RATE_LIMITED)
    }

    /// Categorizes error for callers that branch on failure kind
    pub fn categorize(&self) -> ErrorCategory {
        match self {
            InfinityError::Api { status, .. } => match *status {
                RATE_LIMITED => ErrorCategory::RateLimited,
                401 | 403 => ErrorCategory::Authentication,
                404 => ErrorCategory::NotFound,
                _ => ErrorCategory::Protocol,
            },
            InfinityError::Transport(_) => ErrorCategory::Transport,
            InfinityError::ParseError(_) => ErrorCategory::Data,
            InfinityError::ConfigError(_) | InfinityError::RuntimeError(_) => {
                ErrorCategory::Configuration
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    RateLimited,
    Authentication,
    NotFound,
    Protocol,
    Transport,
    Data,
    Configuration,
}

/// Retry policy with exponential backoff, applied to rate-limited failures only.
///
/// `max_attempts` counts every call including the first, so the default of 3
/// sleeps `base_delay` and then `2 * base_delay` before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay slept after the zero-based `attempt` failed: `base_delay * 2^attempt`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt);
        let delay = self.base_delay.saturating_mul(factor);
        debug!("Retry attempt {}: delay = {:?}", attempt + 1, delay);
        delay
    }

    /// Execute operation with retry logic.
    ///
    /// Only errors carrying status 429 are retried. Anything else, or the
    /// final rate-limited failure, is returned unchanged.
    pub async fn execute<F, T, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!("Operation succeeded after {} retries", attempt);
                    }
                    return Ok(result);
                }
                Err(e) if e.is_rate_limited() && attempt + 1 < max_attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        "⏳ Rate limited (429). Retrying in {:.1}s... (attempt {}/{})",
                        delay.as_secs_f64(),
                        attempt + 1,
                        max_attempts
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, InfinityError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn rate_limited() -> InfinityError {
        InfinityError::api("Rate limited (429). Retry after 60 seconds", RATE_LIMITED)
    }

    #[test]
    fn test_status_code_presence_distinguishes_transport_errors() {
        let protocol = InfinityError::api("Bad Request", 400);
        assert_eq!(protocol.status_code(), Some(400));
        assert_eq!(protocol.to_string(), "Bad Request");

        let transport = InfinityError::Transport("Request failed: connection refused".into());
        assert_eq!(transport.status_code(), None);
        assert_eq!(transport.categorize(), ErrorCategory::Transport);
    }

    #[test]
    fn test_categorize_by_status() {
        assert_eq!(rate_limited().categorize(), ErrorCategory::RateLimited);
        assert_eq!(InfinityError::api("no", 401).categorize(), ErrorCategory::Authentication);
        assert_eq!(InfinityError::api("no", 403).categorize(), ErrorCategory::Authentication);
        assert_eq!(InfinityError::api("gone", 404).categorize(), ErrorCategory::NotFound);
        assert_eq!(InfinityError::api("boom", 500).categorize(), ErrorCategory::Protocol);
    }

    #[test]
    fn test_delay_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_rate_limits_with_increasing_delay() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let seen = calls.clone();
        let result = policy
            .execute(|| {
                let seen = seen.clone();
                async move {
                    let mut seen = seen.lock().unwrap();
                    seen.push(Instant::now());
                    if seen.len() < 3 {
                        Err(rate_limited())
                    } else {
                        Ok("posted")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "posted");
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        let first_gap = calls[1] - calls[0];
        let second_gap = calls[2] - calls[1];
        assert_eq!(first_gap, Duration::from_secs(1));
        assert_eq!(second_gap, Duration::from_secs(2));
        assert!(second_gap > first_gap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_surface_rate_limit() {
        let policy = RetryPolicy::default();
        let mut attempts = 0;

        let result: Result<()> = policy
            .execute(|| {
                attempts += 1;
                async { Err(rate_limited()) }
            })
            .await;

        assert_eq!(attempts, 3);
        assert_eq!(result.unwrap_err().status_code(), Some(429));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let mut attempts = 0;

        let result: Result<()> = policy
            .execute(|| {
                attempts += 1;
                async { Err(InfinityError::api("Unauthorized", 401)) }
            })
            .await;

        assert_eq!(attempts, 1);
        assert_eq!(result.unwrap_err().status_code(), Some(401));
    }
}
