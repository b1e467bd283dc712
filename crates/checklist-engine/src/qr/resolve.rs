//! Resolution of parsed payloads against the live stores.

use database::{checklist, equipment, operator, Checklist, Database, Equipment, Operator};

use super::payload::{parse_payload, ParsedPayload, QrKind};
use crate::error::{EngineError, Result};

/// A payload resolved to a stored record.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Operator(Operator),
    Equipment(Equipment),
    Checklist(Checklist),
}

impl Resolved {
    pub fn kind(&self) -> QrKind {
        match self {
            Self::Operator(_) => QrKind::Operator,
            Self::Equipment(_) => QrKind::Equipment,
            Self::Checklist(_) => QrKind::Checklist,
        }
    }
}

/// Parse and resolve a raw payload.
pub async fn resolve(db: &Database, raw: &str) -> Result<Resolved> {
    let parsed = parse_payload(raw)?;
    resolve_parsed(db, &parsed).await
}

/// Resolve an already parsed payload. Always reads the stores.
pub async fn resolve_parsed(db: &Database, parsed: &ParsedPayload) -> Result<Resolved> {
    let pool = db.pool();
    match parsed {
        ParsedPayload::OperatorCode(code) => {
            Ok(Resolved::Operator(operator::get_operator_by_code(pool, code).await?))
        }
        ParsedPayload::Uuid { uuid, hint: Some(QrKind::Checklist) } => {
            Ok(Resolved::Checklist(checklist::get_checklist_by_uuid(pool, uuid).await?))
        }
        ParsedPayload::Uuid { uuid, hint } => {
            match equipment::get_equipment_by_uuid(pool, uuid).await {
                Ok(eq) => Ok(Resolved::Equipment(eq)),
                Err(database::DatabaseError::NotFound { .. }) if hint.is_none() => {
                    Ok(Resolved::Checklist(checklist::get_checklist_by_uuid(pool, uuid).await?))
                }
                Err(e) => Err(EngineError::from(e)),
            }
        }
        ParsedPayload::LegacyId(id) => {
            Ok(Resolved::Equipment(equipment::get_equipment(pool, *id).await?))
        }
    }
}
