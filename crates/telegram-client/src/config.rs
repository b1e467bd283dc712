//! Configuration types for telegram-client.

use std::env;
use std::time::Duration;

use bot_core::parse_duration;

use crate::error::BotError;

/// Default Bot API base URL.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Configuration for connecting to the Bot API.
#[derive(Clone)]
pub struct BotConfig {
    /// Bot token issued by BotFather.
    pub token: String,
    /// Base URL of the Bot API (overridable for local Bot API servers).
    pub api_url: String,
    /// Per-request timeout for regular calls.
    pub transport_timeout: Duration,
    /// Long-poll wait in seconds passed to `getUpdates`.
    pub poll_timeout: u64,
}

impl BotConfig {
    /// Create a new configuration with the given token and defaults.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            transport_timeout: Duration::from_secs(10),
            poll_timeout: 30,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `TELEGRAM_TOKEN` | required |
    /// | `TELEGRAM_API_URL` | `https://api.telegram.org` |
    /// | `TRANSPORT_TIMEOUT` | `10s` |
    /// | `TELEGRAM_POLL_TIMEOUT` | `30` (seconds) |
    pub fn from_env() -> Result<Self, BotError> {
        let token = env::var("TELEGRAM_TOKEN")
            .map_err(|_| BotError::Config("TELEGRAM_TOKEN is not set".to_string()))?;
        if token.trim().is_empty() {
            return Err(BotError::Config("TELEGRAM_TOKEN is empty".to_string()));
        }

        let mut config = Self::new(token.trim());

        if let Ok(url) = env::var("TELEGRAM_API_URL") {
            config.api_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(value) = env::var("TRANSPORT_TIMEOUT") {
            config.transport_timeout = parse_duration(&value).ok_or_else(|| {
                BotError::Config(format!("invalid TRANSPORT_TIMEOUT: {}", value))
            })?;
        }

        if let Ok(value) = env::var("TELEGRAM_POLL_TIMEOUT") {
            config.poll_timeout = value.trim().parse().map_err(|_| {
                BotError::Config(format!("invalid TELEGRAM_POLL_TIMEOUT: {}", value))
            })?;
        }

        Ok(config)
    }

    /// Set a custom API base URL.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Get the URL of a Bot API method.
    pub fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    /// Total time allowed for a long-poll request.
    pub fn poll_request_timeout(&self) -> Duration {
        self.transport_timeout + Duration::from_secs(self.poll_timeout)
    }
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("transport_timeout", &self.transport_timeout)
            .field("poll_timeout", &self.poll_timeout)
            .finish()
    }
}
