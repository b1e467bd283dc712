//! Core types shared by the chat transport and the checklist engine.
//!
//! This crate keeps the engine independent of any concrete bot API. It defines:
//!
//! - [`InboundEvent`] - A text, callback or photo event from one chat
//! - [`OutboundReply`] / [`Button`] - What the engine sends back
//! - [`ReplySender`] - The trait transports implement to deliver replies
//! - [`SendError`] - Error type for reply delivery
//! - [`parse_duration`] - Duration values shared by every crate's env config
//!
//! # Example
//!
//! ```rust
//! use bot_core::{async_trait, Button, OutboundReply, ReplySender, SendError};
//!
//! struct StdoutSender;
//!
//! #[async_trait]
//! impl ReplySender for StdoutSender {
//!     async fn send(&self, reply: &OutboundReply) -> Result<(), SendError> {
//!         println!("{} <- {}", reply.chat_id(), reply.body());
//!         Ok(())
//!     }
//! }
//!
//! let reply = OutboundReply::text(7, "Escolha").with_row(vec![Button::new("OK", "ans:1:OK")]);
//! assert_eq!(reply.chat_id(), 7);
//! ```

mod duration;
mod error;
mod event;
mod reply;
mod sender;

pub use duration::parse_duration;
pub use error::SendError;
pub use event::{Command, EventKind, InboundEvent};
pub use reply::{Button, OutboundReply};
pub use sender::{LoggingSender, NoOpSender, RecordingSender, ReplySender};

// Re-export async_trait for convenience
pub use async_trait::async_trait;
