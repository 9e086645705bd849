use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{InfinityError, Result, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://spider.infinitybots.gg/api";
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(3600);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound for the refresh interval (one year).
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(365 * 24 * 3600);

/// Identity and tuning for one client. Immutable once handed to a client.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub token: String,
    pub bot_id: String,
    pub base_url: String,
    pub auto_refresh: bool,
    pub refresh_interval: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(token: impl Into<String>, bot_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            bot_id: bot_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            auto_refresh: true,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("INFINITY_BOT_TOKEN")
            .ok_or_else(|| InfinityError::ConfigError("INFINITY_BOT_TOKEN is not set".into()))?;
        let bot_id = lookup("INFINITY_BOT_ID")
            .ok_or_else(|| InfinityError::ConfigError("INFINITY_BOT_ID is not set".into()))?;

        let defaults = RetryPolicy::default();
        let mut config = ClientConfig::new(token, bot_id)
            .with_auto_refresh(
                lookup("INFINITY_AUTO_REFRESH")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(true),
            )
            .with_refresh_interval(
                lookup("INFINITY_REFRESH_INTERVAL_SECS")
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_REFRESH_INTERVAL),
            )
            .with_request_timeout(
                lookup("INFINITY_REQUEST_TIMEOUT_SECS")
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            )
            .with_retry_policy(RetryPolicy::new(
                lookup("INFINITY_MAX_RETRIES")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.max_attempts),
                lookup("INFINITY_RETRY_BASE_DELAY_MS")
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.base_delay),
            ));

        if let Some(base_url) = lookup("INFINITY_BASE_URL") {
            config = config.with_base_url(base_url);
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects a zero refresh interval or request timeout, and refresh
    /// intervals above [`MAX_REFRESH_INTERVAL`].
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval.is_zero() {
            return Err(InfinityError::ConfigError(
                "Refresh interval must be greater than zero".to_string(),
            ));
        }
        if self.refresh_interval > MAX_REFRESH_INTERVAL {
            return Err(InfinityError::ConfigError(format!(
                "Refresh interval {:?} exceeds the maximum of {:?}",
                self.refresh_interval, MAX_REFRESH_INTERVAL
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(InfinityError::ConfigError(
                "Request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_and_log(&self) {
        log::info!("Infinity client configuration loaded: {:?}", self);
        if !self.base_url.starts_with("https://") {
            log::warn!("Base URL {} is not HTTPS", self.base_url);
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"<redacted>")
            .field("bot_id", &self.bot_id)
            .field("base_url", &self.base_url)
            .field("auto_refresh", &self.auto_refresh)
            .field("refresh_interval", &self.refresh_interval)
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}
