//! Telegram listener for the NR12 checklist bot.
//!
//! Long-polls the Bot API, converts each update into a
//! [`bot_core::InboundEvent`], and hands it to a per-chat worker so events
//! of one chat are handled strictly in arrival order while different chats
//! proceed in parallel.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use checklist_engine::{ChecklistEngine, ChecklistService, EngineConfig};
//! use database::Database;
//! use message_listener::{MessageProcessor, ProcessorConfig};
//! use telegram_client::{BotConfig, TelegramClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::from_env()?;
//! let db = Database::connect(&config.sqlite_url).await?;
//! let client = TelegramClient::connect(BotConfig::from_env()?).await?;
//!
//! let engine = Arc::new(ChecklistEngine::new(
//!     ChecklistService::new(db, config),
//!     client.clone(),
//! ));
//! let processor = MessageProcessor::new(engine, ProcessorConfig::default())
//!     .with_acknowledger(client.clone());
//!
//! let updates = telegram_client::subscribe(&client);
//! processor.run_with_shutdown(updates, async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```

mod ack;
mod dispatcher;
mod processor;

pub use ack::CallbackAck;
pub use dispatcher::Dispatcher;
pub use processor::{MessageProcessor, ProcessResult, ProcessorConfig, ProcessorError};

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
