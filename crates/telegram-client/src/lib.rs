//! Telegram Bot API client library.
//!
//! This crate provides a Rust client for the subset of the Telegram Bot API
//! the NR12 bot needs. It supports:
//!
//! - Receiving updates through a long-poll stream with backoff
//! - Sending text with inline keyboards, and photos
//! - Acknowledging callback queries
//! - Converting updates into transport-agnostic [`bot_core::InboundEvent`]s
//!
//! # Example
//!
//! ```no_run
//! use telegram_client::{BotConfig, TelegramClient};
//!
//! # async fn example() -> Result<(), telegram_client::BotError> {
//! // Connect with TELEGRAM_TOKEN from the environment
//! let config = BotConfig::from_env()?;
//! let client = TelegramClient::connect(config).await?;
//!
//! // Send a message
//! let sent = client.send_text(123456789, "Olá!").await?;
//! println!("Sent message {}", sent.message_id);
//!
//! // Subscribe to incoming updates
//! use futures::StreamExt;
//! let mut updates = telegram_client::subscribe(&client);
//! while let Some(result) = updates.next().await {
//!     match result {
//!         Ok(update) => println!("Update {}", update.update_id),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod poll;
pub mod types;

pub use client::TelegramClient;
pub use config::BotConfig;
pub use error::BotError;
pub use poll::{subscribe, subscribe_with_reconnect, ReconnectConfig, UpdateStream};
pub use types::*;

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
