//! Application state shared across handlers.

use checklist_engine::{ChecklistService, EngineConfig, QrService};
use database::Database;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Checklist lifecycle, alerts and the operator registry.
    pub service: ChecklistService,
    /// QR image generation.
    pub qr: QrService,
}

impl AppState {
    /// Create new application state.
    pub fn new(db: Database, config: EngineConfig) -> Self {
        Self {
            qr: QrService::new(db.clone(), config.clone()),
            service: ChecklistService::new(db, config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.service.config()
    }

    pub fn db(&self) -> &Database {
        self.service.database()
    }
}
