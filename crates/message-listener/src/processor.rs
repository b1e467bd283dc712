//! Message processor that connects the Telegram update stream to the checklist engine.

use std::sync::Arc;
use std::time::Duration;

use bot_core::ReplySender;
use checklist_engine::{ChecklistEngine, SessionStore};
use chrono::Utc;
use futures::{Stream, StreamExt};
use telegram_client::{BotError, Update};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::ack::CallbackAck;
use crate::dispatcher::Dispatcher;

/// Configuration for the message processor.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Events buffered per chat before dispatching waits.
    pub worker_queue: usize,

    /// A chat worker exits after this long without events.
    pub worker_idle: Duration,

    /// How often expired sessions are evicted.
    pub session_sweep_interval: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            worker_queue: 32,
            worker_idle: Duration::from_secs(300),
            session_sweep_interval: Duration::from_secs(600),
        }
    }
}

/// Errors that can occur during message processing.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Error from the Bot API.
    #[error("bot error: {0}")]
    Bot(#[from] BotError),

    /// The update stream ended unexpectedly.
    #[error("update stream ended")]
    StreamEnded,
}

/// Result of handling a single update.
#[derive(Debug, PartialEq, Eq)]
pub enum ProcessResult {
    /// Queued on the chat's worker.
    Dispatched { chat_id: i64 },
    /// Nothing the engine understands (stickers, edits, bots, etc.).
    Skipped { reason: String },
}

/// Receives updates and feeds them to the engine through per-chat workers.
pub struct MessageProcessor<S: ReplySender + 'static> {
    sessions: Arc<SessionStore>,
    dispatcher: Dispatcher<S>,
    acknowledger: Option<Arc<dyn CallbackAck>>,
    config: ProcessorConfig,
}

impl<S: ReplySender + 'static> MessageProcessor<S> {
    pub fn new(engine: Arc<ChecklistEngine<S>>, config: ProcessorConfig) -> Self {
        Self {
            sessions: Arc::clone(engine.sessions()),
            dispatcher: Dispatcher::new(engine, config.worker_queue, config.worker_idle),
            acknowledger: None,
            config,
        }
    }

    pub fn with_defaults(engine: Arc<ChecklistEngine<S>>) -> Self {
        Self::new(engine, ProcessorConfig::default())
    }

    /// Acknowledge callback queries through `ack`.
    pub fn with_acknowledger(mut self, ack: impl CallbackAck + 'static) -> Self {
        self.acknowledger = Some(Arc::new(ack));
        self
    }

    /// Handle one update.
    pub async fn handle_update(&mut self, update: &Update) -> ProcessResult {
        if let Some(callback) = &update.callback_query {
            self.acknowledge(&callback.id).await;
        }

        if is_from_bot(update) {
            return ProcessResult::Skipped {
                reason: "sent by a bot".to_string(),
            };
        }

        match update.to_inbound_event(Utc::now()) {
            Some(event) => {
                let chat_id = event.chat_id;
                debug!(chat_id, update_id = update.update_id, "Dispatching {:?} event", event.kind);
                self.dispatcher.dispatch(event).await;
                ProcessResult::Dispatched { chat_id }
            }
            None => ProcessResult::Skipped {
                reason: format!("update {} carries no supported content", update.update_id),
            },
        }
    }

    async fn acknowledge(&self, callback_query_id: &str) {
        if let Some(ack) = &self.acknowledger {
            if let Err(e) = ack.ack(callback_query_id).await {
                warn!("Failed to acknowledge callback {}: {}", callback_query_id, e);
            }
        }
    }

    /// Run the processor with graceful shutdown support.
    ///
    /// This method runs until either:
    /// - The provided shutdown signal completes
    /// - The update stream ends
    ///
    /// In both cases events already dispatched are handled before returning.
    pub async fn run_with_shutdown<U, F>(mut self, updates: U, shutdown_signal: F) -> Result<(), ProcessorError>
    where
        U: Stream<Item = Result<Update, BotError>> + Send + Unpin,
        F: std::future::Future<Output = ()> + Send,
    {
        info!("Starting message processor (graceful shutdown enabled)");

        let sweeper = self.sessions.start_sweeper(self.config.session_sweep_interval);
        let mut updates = updates;
        tokio::pin!(shutdown_signal);

        let outcome = loop {
            tokio::select! {
                biased;

                () = &mut shutdown_signal => {
                    info!("Shutdown signal received, stopping message processor");
                    break Ok(());
                }

                result = updates.next() => {
                    match result {
                        Some(Ok(update)) => match self.handle_update(&update).await {
                            ProcessResult::Dispatched { .. } => {}
                            ProcessResult::Skipped { reason } => debug!("Skipped: {}", reason),
                        },
                        Some(Err(e)) => {
                            // The stream backs off and retries on its own.
                            error!("Update stream error: {}", e);
                        }
                        None => {
                            warn!("Update stream ended");
                            break Err(ProcessorError::StreamEnded);
                        }
                    }
                }
            }
        };

        sweeper.abort();
        self.dispatcher.shutdown().await;
        outcome
    }
}

fn is_from_bot(update: &Update) -> bool {
    if let Some(message) = &update.message {
        return message.from.as_ref().is_some_and(|u| u.is_bot);
    }
    update.callback_query.as_ref().is_some_and(|c| c.from.is_bot)
}
