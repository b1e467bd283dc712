//! Maintenance alerts raised from non-conforming checklist items.

use chrono::{DateTime, Utc};
use database::{
    alert, checklist, checklist_item, AlertKind, AlertState, ChecklistState, Database,
    ItemStatus, MaintenanceAlert, NewAlert,
};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone)]
pub struct AlertEmitter {
    db: Database,
    config: EngineConfig,
}

impl AlertEmitter {
    pub fn new(db: Database, config: EngineConfig) -> Self {
        Self { db, config }
    }

    /// Raise CORRECTIVE alerts for the HIGH/CRITICAL NOK items of a completed checklist.
    ///
    /// An unresolved alert for the same equipment and standard item inside
    /// the dedup window suppresses a new one. Safe to call again.
    pub async fn emit_for(&self, checklist_id: i64, now: DateTime<Utc>) -> Result<Vec<MaintenanceAlert>> {
        let pool = self.db.pool();
        let chk = checklist::get_checklist(pool, checklist_id).await?;
        if chk.state != ChecklistState::Completed {
            return Err(EngineError::Input(format!(
                "checklist {} is {}, not COMPLETED",
                chk.uuid,
                chk.state.as_str()
            )));
        }

        let since = now - self.config.dedup_window();
        let today = self.config.today(now);
        let mut created = Vec::new();

        for item in checklist_item::list_items(pool, chk.id).await? {
            if item.status != ItemStatus::Nok || !item.criticality.raises_alert() {
                continue;
            }

            if let Some(existing) =
                alert::find_recent_duplicate(pool, chk.equipment_id, item.standard_item_id, since).await?
            {
                debug!(
                    equipment_id = chk.equipment_id,
                    alert_id = existing.id,
                    "Suppressed duplicate alert for '{}'",
                    item.text
                );
                continue;
            }

            let new = NewAlert {
                equipment_id: chk.equipment_id,
                kind: AlertKind::Corrective,
                title: format!("Non-conforming: {}", item.text),
                description: item.observation.clone(),
                criticality: item.criticality,
                standard_item_id: Some(item.standard_item_id),
                scheduled_for: today,
                checklist_id: Some(chk.id),
            };
            created.push(alert::create_alert(pool, &new, now).await?);
        }

        if !created.is_empty() {
            info!(
                checklist_id = chk.id,
                equipment_id = chk.equipment_id,
                "Emitted {} maintenance alerts",
                created.len()
            );
        }
        Ok(created)
    }

    pub async fn list(&self, state: Option<AlertState>) -> Result<Vec<MaintenanceAlert>> {
        Ok(alert::list_alerts(self.db.pool(), state).await?)
    }

    pub async fn mark_notified(&self, alert_id: i64, now: DateTime<Utc>) -> Result<MaintenanceAlert> {
        if !alert::mark_notified(self.db.pool(), alert_id, now).await? {
            return Err(EngineError::Input(format!("alert {} is not ACTIVE", alert_id)));
        }
        Ok(alert::get_alert(self.db.pool(), alert_id).await?)
    }

    pub async fn mark_resolved(&self, alert_id: i64, now: DateTime<Utc>) -> Result<MaintenanceAlert> {
        if !alert::mark_resolved(self.db.pool(), alert_id, now).await? {
            return Err(EngineError::Input(format!("alert {} is already resolved", alert_id)));
        }
        Ok(alert::get_alert(self.db.pool(), alert_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use database::{catalog, equipment, Cadence, Criticality, NewChecklist, NewEquipment, NewStandardItem, Shift};

    async fn completed_with_noks(db: &Database, date: NaiveDate) -> (i64, i64) {
        let pool = db.pool();
        let type_id = match catalog::list_types(pool).await.unwrap().first() {
            Some(t) => t.id,
            None => {
                let t = catalog::create_type(pool, "Trator", "").await.unwrap();
                catalog::add_standard_item(pool, t, &NewStandardItem::new(1, "Freios", Criticality::High))
                    .await
                    .unwrap();
                catalog::add_standard_item(pool, t, &NewStandardItem::new(2, "Buzina", Criticality::Low))
                    .await
                    .unwrap();
                equipment::create_equipment(pool, &NewEquipment::new("T-1").nr12(t, &[Cadence::Daily]))
                    .await
                    .unwrap();
                t
            }
        };
        let eq = equipment::list_nr12_active(pool).await.unwrap().remove(0);
        let items = catalog::active_items_for_type(pool, type_id).await.unwrap();
        let chk = checklist::create_with_items(pool, &NewChecklist::pending(eq.id, date, Shift::Morning, Cadence::Daily), &items)
            .await
            .unwrap();
        for item in checklist_item::list_items(pool, chk.id).await.unwrap() {
            checklist_item::answer_item(pool, item.id, ItemStatus::Nok, "defeito", None, Utc::now())
                .await
                .unwrap();
        }
        assert!(checklist::complete(pool, chk.id, true, Utc::now()).await.unwrap());
        (chk.id, eq.id)
    }

    #[tokio::test]
    async fn test_only_high_levels_emit_and_duplicates_suppressed() {
        let db = Database::connect_in_memory().await.unwrap();
        let emitter = AlertEmitter::new(db.clone(), EngineConfig::default());
        let now = Utc::now();

        let (first, eq_id) = completed_with_noks(&db, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()).await;
        let alerts = emitter.emit_for(first, now).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "Non-conforming: Freios");
        assert_eq!(alerts[0].description, "defeito");
        assert_eq!(alerts[0].criticality, Criticality::High);
        assert_eq!(alerts[0].equipment_id, eq_id);
        assert_eq!(alerts[0].checklist_id, Some(first));

        // Re-emission and a second checklist within the window add nothing.
        assert!(emitter.emit_for(first, now).await.unwrap().is_empty());
        let (second, _) = completed_with_noks(&db, NaiveDate::from_ymd_opt(2025, 6, 3).unwrap()).await;
        assert!(emitter.emit_for(second, now).await.unwrap().is_empty());

        // Outside the window a new alert is raised.
        let later = now + chrono::Duration::hours(25);
        assert_eq!(emitter.emit_for(second, later).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_requires_completed_checklist() {
        let db = Database::connect_in_memory().await.unwrap();
        let pool = db.pool();
        let t = catalog::create_type(pool, "Grua", "").await.unwrap();
        catalog::add_standard_item(pool, t, &NewStandardItem::new(1, "Cabo", Criticality::Critical))
            .await
            .unwrap();
        let eq = equipment::create_equipment(pool, &NewEquipment::new("G").nr12(t, &[Cadence::Daily]))
            .await
            .unwrap();
        let items = catalog::active_items_for_type(pool, t).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let chk = checklist::create_with_items(pool, &NewChecklist::pending(eq.id, date, Shift::Morning, Cadence::Daily), &items)
            .await
            .unwrap();

        let emitter = AlertEmitter::new(db.clone(), EngineConfig::default());
        assert!(matches!(emitter.emit_for(chk.id, Utc::now()).await, Err(EngineError::Input(_))));
    }

    #[tokio::test]
    async fn test_state_actions() {
        let db = Database::connect_in_memory().await.unwrap();
        let emitter = AlertEmitter::new(db.clone(), EngineConfig::default());
        let (chk, _) = completed_with_noks(&db, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()).await;
        let alert = emitter.emit_for(chk, Utc::now()).await.unwrap().remove(0);

        let notified = emitter.mark_notified(alert.id, Utc::now()).await.unwrap();
        assert_eq!(notified.state, AlertState::Notified);
        assert!(matches!(emitter.mark_notified(alert.id, Utc::now()).await, Err(EngineError::Input(_))));

        let resolved = emitter.mark_resolved(alert.id, Utc::now()).await.unwrap();
        assert_eq!(resolved.state, AlertState::Resolved);
        assert_eq!(emitter.list(Some(AlertState::Resolved)).await.unwrap().len(), 1);
    }
}
