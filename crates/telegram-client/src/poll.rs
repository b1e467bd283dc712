//! Long-poll update stream.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use futures::stream::{self, Stream};
use tracing::{debug, info, warn};

use crate::client::TelegramClient;
use crate::error::BotError;
use crate::types::Update;

/// Configuration for retrying failed polls.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of consecutive failures (None = infinite).
    pub max_retries: Option<u32>,
    /// Initial delay before first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier for each retry.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Calculate delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }

    /// Check if we should retry after the given number of attempts.
    pub fn should_retry(&self, attempts: u32) -> bool {
        self.max_retries.map_or(true, |max| attempts < max)
    }
}

/// A stream of incoming updates in `update_id` order.
pub type UpdateStream = Pin<Box<dyn Stream<Item = Result<Update, BotError>> + Send>>;

struct PollState {
    client: TelegramClient,
    reconnect: ReconnectConfig,
    offset: i64,
    buffer: VecDeque<Update>,
    failures: u32,
}

/// Create an update stream with default retry behaviour.
pub fn subscribe(client: &TelegramClient) -> UpdateStream {
    subscribe_with_reconnect(client, ReconnectConfig::default())
}

/// Create an update stream with custom retry configuration.
///
/// Each poll error is yielded once; the next poll waits for the backoff
/// delay. The stream ends when `max_retries` consecutive polls fail.
pub fn subscribe_with_reconnect(
    client: &TelegramClient,
    reconnect: ReconnectConfig,
) -> UpdateStream {
    info!("Starting long-poll update stream");

    let state = PollState {
        client: client.clone(),
        reconnect,
        offset: 0,
        buffer: VecDeque::new(),
        failures: 0,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(update) = state.buffer.pop_front() {
                return Some((Ok(update), state));
            }

            if state.failures > 0 {
                if !state.reconnect.should_retry(state.failures) {
                    warn!("Giving up after {} failed polls", state.failures);
                    return None;
                }
                let delay = state.reconnect.delay_for_attempt(state.failures - 1);
                debug!("Retrying poll in {:?}", delay);
                tokio::time::sleep(delay).await;
            }

            match state.client.get_updates(state.offset).await {
                Ok(updates) => {
                    if state.failures > 0 {
                        info!("Update polling restored");
                    }
                    state.failures = 0;
                    for update in updates {
                        state.offset = state.offset.max(update.update_id + 1);
                        state.buffer.push_back(update);
                    }
                }
                Err(e) => {
                    state.failures += 1;
                    warn!("Poll failed: {} (failures: {})", e, state.failures);
                    return Some((Err(e), state));
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(30));
    }

    #[test]
    fn test_should_retry_limit() {
        let config = ReconnectConfig {
            max_retries: Some(2),
            ..Default::default()
        };
        assert!(config.should_retry(1));
        assert!(!config.should_retry(2));
        assert!(ReconnectConfig::default().should_retry(u32::MAX));
    }
}
