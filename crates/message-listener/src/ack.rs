//! Acknowledgement of inline button presses.

use async_trait::async_trait;
use telegram_client::{BotError, TelegramClient};

/// Stops the client-side spinner of a pressed inline button.
#[async_trait]
pub trait CallbackAck: Send + Sync {
    async fn ack(&self, callback_query_id: &str) -> Result<(), BotError>;
}

#[async_trait]
impl CallbackAck for TelegramClient {
    async fn ack(&self, callback_query_id: &str) -> Result<(), BotError> {
        self.answer_callback_query(callback_query_id).await
    }
}
