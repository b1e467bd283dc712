//! QR addressing: payload forms, image generation and resolution.

mod payload;
mod render;
mod resolve;

pub use payload::{
    checklist_payload, equipment_payload, image_path, operator_payload, parse_payload,
    ParsedPayload, QrKind, QrSize,
};
pub use render::{render_png, write_all_sizes, GeneratedQr};
pub use resolve::{resolve, resolve_parsed, Resolved};

use database::{checklist, equipment, operator, Database};
use tracing::info;

use crate::config::EngineConfig;
use crate::error::Result;

/// Generates QR images for stored identities.
#[derive(Debug, Clone)]
pub struct QrService {
    db: Database,
    config: EngineConfig,
}

impl QrService {
    pub fn new(db: Database, config: EngineConfig) -> Self {
        Self { db, config }
    }

    /// Operator login QR, keyed by operator code.
    pub async fn generate_for_operator(&self, operator_id: i64) -> Result<Vec<GeneratedQr>> {
        let op = operator::get_operator(self.db.pool(), operator_id).await?;
        let data = operator_payload(&self.config.bot_deep_link_base, &op.code);
        let files = write_all_sizes(&self.config.qr_root, QrKind::Operator, &op.code, &data).await?;
        info!(operator_id, "Generated operator QR codes");
        Ok(files)
    }

    /// Equipment QR, keyed by equipment id.
    pub async fn generate_for_equipment(&self, equipment_id: i64) -> Result<Vec<GeneratedQr>> {
        let eq = equipment::get_equipment(self.db.pool(), equipment_id).await?;
        let data = equipment_payload(&self.config.bot_deep_link_base, &eq.uuid);
        let files = write_all_sizes(
            &self.config.qr_root,
            QrKind::Equipment,
            &eq.id.to_string(),
            &data,
        )
        .await?;
        info!(equipment_id, "Generated equipment QR codes");
        Ok(files)
    }

    /// Checklist QR, keyed by checklist UUID.
    pub async fn generate_for_checklist(&self, uuid: &str) -> Result<Vec<GeneratedQr>> {
        let chk = checklist::get_checklist_by_uuid(self.db.pool(), uuid).await?;
        let data = checklist_payload(&self.config.web_base_url, &chk.uuid);
        let files = write_all_sizes(&self.config.qr_root, QrKind::Checklist, &chk.uuid, &data).await?;
        info!(checklist_id = chk.id, "Generated checklist QR codes");
        Ok(files)
    }

    pub async fn resolve(&self, raw: &str) -> Result<Resolved> {
        resolve(&self.db, raw).await
    }
}
