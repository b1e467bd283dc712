//! NR12 checklist lifecycle engine.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐   ┌───────────┐   ┌────────────────┐   ┌──────────────┐
//! │ Scheduler │──▶│  Catalog  │   │ ChecklistEngine│──▶│ ReplySender  │
//! └─────┬─────┘   └─────▲─────┘   └───────┬────────┘   └──────────────┘
//!       │               │                 │
//!       │         ┌─────┴──────────┐      │ sessions, QR resolution
//!       └────────▶│ChecklistService│◀─────┘
//!                 └─────┬──────────┘
//!                       │ finalize
//!                 ┌─────▼──────┐
//!                 │AlertEmitter│
//!                 └────────────┘
//! ```
//!
//! The scheduler materializes PENDING checklists. Operators reach them by
//! scanning QR codes in the bot, which the [`ChecklistEngine`] turns into a
//! per-chat state machine over [`ChecklistService`]. Completion hands the
//! checklist to the [`AlertEmitter`].
//!
//! # Example
//!
//! ```no_run
//! use bot_core::{InboundEvent, LoggingSender};
//! use checklist_engine::{ChecklistEngine, ChecklistService, EngineConfig};
//! use database::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::from_env()?;
//!     let db = Database::connect(&config.sqlite_url).await?;
//!     db.migrate().await?;
//!
//!     let engine = ChecklistEngine::new(ChecklistService::new(db, config), LoggingSender);
//!     let event = InboundEvent::text(42, "OP0001", chrono::Utc::now());
//!     engine.process(&event).await?;
//!     Ok(())
//! }
//! ```

pub mod alerts;
pub mod callback;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod messages;
pub mod qr;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod session;

pub use alerts::AlertEmitter;
pub use callback::{parse_text_answer, CallbackAction};
pub use catalog::Catalog;
pub use config::{ConfigError, EngineConfig};
pub use engine::ChecklistEngine;
pub use error::{EngineError, Result};
pub use qr::{QrKind, QrService, QrSize, Resolved};
pub use registry::OperatorRegistry;
pub use scheduler::{RunReport, Scheduler};
pub use service::{
    ChecklistService, CreateOutcome, FinalizeOutcome, SubmitOutcome, SubmitRequest,
    SubmittedResponse,
};
pub use session::{Focus, OperatorSession, SessionStatus, SessionStore};
