//! Operator registry: authentication and authorization over the operator store.

use chrono::{DateTime, Utc};
use database::{operator, Database, Equipment, Operator};
use tracing::{info, warn};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    db: Database,
}

impl OperatorRegistry {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Log an operator in from a chat.
    ///
    /// Binds `chat_id` to the operator (unbinding it from anyone else) and
    /// stamps the last access.
    pub async fn authenticate(&self, code: &str, chat_id: i64, now: DateTime<Utc>) -> Result<Operator> {
        let op = match operator::get_operator_by_code(self.db.pool(), code).await {
            Ok(op) => op,
            Err(database::DatabaseError::NotFound { .. }) => {
                warn!(chat_id, "Login with unknown operator code");
                return Err(EngineError::Auth(format!("unknown operator code {}", code)));
            }
            Err(e) => return Err(e.into()),
        };

        if !op.can_use_bot() {
            warn!(chat_id, operator_id = op.id, "Login rejected for inactive operator");
            return Err(EngineError::Auth(format!("operator {} is not active", op.code)));
        }

        operator::bind_chat(self.db.pool(), op.id, chat_id, now).await?;
        info!(chat_id, operator_id = op.id, "Operator authenticated");

        Ok(operator::get_operator(self.db.pool(), op.id).await?)
    }

    /// Live operator record; fails with `Auth` once the operator can no longer use the bot.
    pub async fn get_active(&self, operator_id: i64) -> Result<Operator> {
        let op = match operator::get_operator(self.db.pool(), operator_id).await {
            Ok(op) => op,
            Err(database::DatabaseError::NotFound { .. }) => {
                return Err(EngineError::Auth(format!("operator {} no longer exists", operator_id)))
            }
            Err(e) => return Err(e.into()),
        };
        if !op.can_use_bot() {
            return Err(EngineError::Auth(format!("operator {} is not active", op.code)));
        }
        Ok(op)
    }

    pub async fn operator_for_chat(&self, chat_id: i64) -> Result<Option<Operator>> {
        Ok(operator::get_operator_by_chat_id(self.db.pool(), chat_id).await?)
    }

    pub async fn authorized_equipment(&self, op: &Operator) -> Result<Vec<Equipment>> {
        Ok(operator::authorized_equipment(self.db.pool(), op.id).await?)
    }

    /// Whether the operator may fill checklists of this equipment.
    pub async fn can_fill(&self, op: &Operator, equipment_id: i64) -> Result<bool> {
        if !op.permissions.may_checklist() {
            return Ok(false);
        }
        let allowed = self.authorized_equipment(op).await?;
        Ok(allowed.iter().any(|e| e.id == equipment_id))
    }

    /// Unbind the operator's chat.
    pub async fn logout(&self, operator_id: i64) -> Result<()> {
        operator::unbind_chat(self.db.pool(), operator_id).await?;
        info!(operator_id, "Operator logged out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::{catalog, equipment, Cadence, NewEquipment, OperatorStatus, Permissions};

    #[tokio::test]
    async fn test_authenticate_binds_chat() {
        let db = Database::connect_in_memory().await.unwrap();
        let registry = OperatorRegistry::new(db.clone());
        let op = operator::create_operator(db.pool(), "Ana", Some("OP0001"), Permissions::field_operator())
            .await
            .unwrap();

        let logged = registry.authenticate("op0001", 555, Utc::now()).await.unwrap();
        assert_eq!(logged.id, op.id);
        assert_eq!(logged.chat_id, Some(555));
        assert!(logged.last_access.is_some());

        let found = registry.operator_for_chat(555).await.unwrap().unwrap();
        assert_eq!(found.id, op.id);

        registry.logout(op.id).await.unwrap();
        assert!(registry.operator_for_chat(555).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inactive_and_unknown_rejected() {
        let db = Database::connect_in_memory().await.unwrap();
        let registry = OperatorRegistry::new(db.clone());
        let op = operator::create_operator(db.pool(), "Bia", None, Permissions::field_operator())
            .await
            .unwrap();
        operator::set_status(db.pool(), op.id, OperatorStatus::Inactive).await.unwrap();

        let err = registry.authenticate(&op.code, 1, Utc::now()).await.unwrap_err();
        assert!(matches!(err, EngineError::Auth(_)));
        assert!(operator::get_operator(db.pool(), op.id).await.unwrap().chat_id.is_none());

        let err = registry.authenticate("OP7777", 1, Utc::now()).await.unwrap_err();
        assert!(matches!(err, EngineError::Auth(_)));

        assert!(matches!(registry.get_active(op.id).await, Err(EngineError::Auth(_))));
    }

    #[tokio::test]
    async fn test_can_fill_requires_permission_and_grant() {
        let db = Database::connect_in_memory().await.unwrap();
        let pool = db.pool();
        let registry = OperatorRegistry::new(db.clone());
        let type_id = catalog::create_type(pool, "Empilhadeira", "").await.unwrap();
        let a = equipment::create_equipment(pool, &NewEquipment::new("A").nr12(type_id, &[Cadence::Daily]))
            .await
            .unwrap();
        let b = equipment::create_equipment(pool, &NewEquipment::new("B").nr12(type_id, &[Cadence::Daily]))
            .await
            .unwrap();

        let op = operator::create_operator(pool, "Caio", None, Permissions::field_operator())
            .await
            .unwrap();
        operator::authorize_equipment(pool, op.id, a.id).await.unwrap();
        assert!(registry.can_fill(&op, a.id).await.unwrap());
        assert!(!registry.can_fill(&op, b.id).await.unwrap());

        let viewer = operator::create_operator(pool, "Duda", None, Permissions(Permissions::VIEW_REPORTS))
            .await
            .unwrap();
        assert!(!registry.can_fill(&viewer, a.id).await.unwrap());
    }
}
