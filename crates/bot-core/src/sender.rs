//! Reply sender trait and implementations.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::SendError;
use crate::reply::OutboundReply;

/// Trait for delivering replies to a chat.
///
/// Abstracted to support different transports (Telegram, tests, etc.)
#[async_trait]
pub trait ReplySender: Send + Sync {
    /// Deliver one reply.
    async fn send(&self, reply: &OutboundReply) -> Result<(), SendError>;

    /// Deliver replies in order, stopping at the first failure.
    async fn send_all(&self, replies: &[OutboundReply]) -> Result<(), SendError> {
        for reply in replies {
            self.send(reply).await?;
        }
        Ok(())
    }
}

/// A no-op sender for testing that discards all replies.
#[derive(Debug, Clone, Default)]
pub struct NoOpSender;

#[async_trait]
impl ReplySender for NoOpSender {
    async fn send(&self, _reply: &OutboundReply) -> Result<(), SendError> {
        Ok(())
    }
}

/// A logging sender for debugging that logs all replies.
#[derive(Debug, Clone, Default)]
pub struct LoggingSender;

#[async_trait]
impl ReplySender for LoggingSender {
    async fn send(&self, reply: &OutboundReply) -> Result<(), SendError> {
        match reply {
            OutboundReply::Text { chat_id, text, buttons } => {
                let count: usize = buttons.iter().map(Vec::len).sum();
                tracing::info!("[text] to {} ({} buttons): {}", chat_id, count, text);
            }
            OutboundReply::Photo { chat_id, path, .. } => {
                tracing::info!("[photo] to {}: {}", chat_id, path.display());
            }
        }
        Ok(())
    }
}

/// A sender that keeps every reply in memory, for assertions.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<OutboundReply>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replies delivered so far.
    pub async fn sent(&self) -> Vec<OutboundReply> {
        self.sent.lock().await.clone()
    }

    /// Drain and return the replies delivered so far.
    pub async fn take(&self) -> Vec<OutboundReply> {
        std::mem::take(&mut *self.sent.lock().await)
    }
}

#[async_trait]
impl ReplySender for RecordingSender {
    async fn send(&self, reply: &OutboundReply) -> Result<(), SendError> {
        self.sent.lock().await.push(reply.clone());
        Ok(())
    }
}
