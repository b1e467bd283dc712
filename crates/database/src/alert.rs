//! Maintenance alert persistence.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{AlertKind, AlertState, MaintenanceAlert, NewAlert};

const ALERT_COLUMNS: &str = r#"
    id, equipment_id, kind, title, description, criticality, standard_item_id,
    scheduled_for, state, checklist_id, created_at, notified_at, resolved_at
"#;

/// Create an ACTIVE alert.
pub async fn create_alert(
    pool: &SqlitePool,
    alert: &NewAlert,
    now: DateTime<Utc>,
) -> Result<MaintenanceAlert> {
    let result = sqlx::query(
        r#"
        INSERT INTO maintenance_alerts
            (equipment_id, kind, title, description, criticality, standard_item_id,
             scheduled_for, checklist_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(alert.equipment_id)
    .bind(alert.kind)
    .bind(&alert.title)
    .bind(&alert.description)
    .bind(alert.criticality)
    .bind(alert.standard_item_id)
    .bind(alert.scheduled_for)
    .bind(alert.checklist_id)
    .bind(now)
    .execute(pool)
    .await?;

    get_alert(pool, result.last_insert_rowid()).await
}

/// Get an alert by ID.
pub async fn get_alert(pool: &SqlitePool, id: i64) -> Result<MaintenanceAlert> {
    let sql = format!("SELECT {} FROM maintenance_alerts WHERE id = ?", ALERT_COLUMNS);
    sqlx::query_as::<_, MaintenanceAlert>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "MaintenanceAlert",
            id: id.to_string(),
        })
}

/// An unresolved alert for the same equipment and standard item created at or after `since`.
pub async fn find_recent_duplicate(
    pool: &SqlitePool,
    equipment_id: i64,
    standard_item_id: i64,
    since: DateTime<Utc>,
) -> Result<Option<MaintenanceAlert>> {
    let sql = format!(
        r#"
        SELECT {} FROM maintenance_alerts
        WHERE equipment_id = ?
          AND standard_item_id = ?
          AND state IN ('ACTIVE', 'NOTIFIED')
          AND created_at >= ?
        ORDER BY id DESC
        LIMIT 1
        "#,
        ALERT_COLUMNS
    );
    let alert = sqlx::query_as::<_, MaintenanceAlert>(&sql)
        .bind(equipment_id)
        .bind(standard_item_id)
        .bind(since)
        .fetch_optional(pool)
        .await?;

    Ok(alert)
}

/// Whether an alert of `kind` already links to the checklist.
pub async fn exists_for_checklist(pool: &SqlitePool, checklist_id: i64, kind: AlertKind) -> Result<bool> {
    let found = sqlx::query_scalar::<_, i32>(
        r#"
        SELECT 1
        FROM maintenance_alerts
        WHERE checklist_id = ? AND kind = ?
        LIMIT 1
        "#,
    )
    .bind(checklist_id)
    .bind(kind)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

/// List alerts, newest first, optionally filtered by state.
pub async fn list_alerts(pool: &SqlitePool, state: Option<AlertState>) -> Result<Vec<MaintenanceAlert>> {
    let alerts = match state {
        Some(state) => {
            let sql = format!(
                "SELECT {} FROM maintenance_alerts WHERE state = ? ORDER BY scheduled_for, id DESC",
                ALERT_COLUMNS
            );
            sqlx::query_as::<_, MaintenanceAlert>(&sql)
                .bind(state)
                .fetch_all(pool)
                .await?
        }
        None => {
            let sql = format!(
                "SELECT {} FROM maintenance_alerts ORDER BY scheduled_for, id DESC",
                ALERT_COLUMNS
            );
            sqlx::query_as::<_, MaintenanceAlert>(&sql)
                .fetch_all(pool)
                .await?
        }
    };

    Ok(alerts)
}

/// Alerts raised from one checklist.
pub async fn list_for_checklist(pool: &SqlitePool, checklist_id: i64) -> Result<Vec<MaintenanceAlert>> {
    let sql = format!(
        "SELECT {} FROM maintenance_alerts WHERE checklist_id = ? ORDER BY id",
        ALERT_COLUMNS
    );
    let alerts = sqlx::query_as::<_, MaintenanceAlert>(&sql)
        .bind(checklist_id)
        .fetch_all(pool)
        .await?;

    Ok(alerts)
}

/// ACTIVE → NOTIFIED. Returns `false` if the alert was in another state.
pub async fn mark_notified(pool: &SqlitePool, id: i64, now: DateTime<Utc>) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE maintenance_alerts
        SET state = 'NOTIFIED', notified_at = ?
        WHERE id = ? AND state = 'ACTIVE'
        "#,
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        get_alert(pool, id).await?;
        return Ok(false);
    }

    Ok(true)
}

/// ACTIVE or NOTIFIED → RESOLVED. Returns `false` if already resolved.
pub async fn mark_resolved(pool: &SqlitePool, id: i64, now: DateTime<Utc>) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE maintenance_alerts
        SET state = 'RESOLVED', resolved_at = ?
        WHERE id = ? AND state IN ('ACTIVE', 'NOTIFIED')
        "#,
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        get_alert(pool, id).await?;
        return Ok(false);
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equipment::create_equipment;
    use crate::models::{Criticality, NewEquipment};
    use crate::Database;
    use chrono::{Duration, NaiveDate};

    fn sample(equipment_id: i64) -> NewAlert {
        NewAlert {
            equipment_id,
            kind: AlertKind::Corrective,
            title: "Non-conforming: Freios".to_string(),
            description: "pastilha gasta".to_string(),
            criticality: Criticality::High,
            standard_item_id: Some(7),
            scheduled_for: NaiveDate::from_ymd_opt(2025, 5, 2).unwrap(),
            checklist_id: None,
        }
    }

    #[tokio::test]
    async fn test_state_actions() {
        let db = Database::connect_in_memory().await.unwrap();
        let pool = db.pool();
        let equipment = create_equipment(pool, &NewEquipment::new("E")).await.unwrap();
        let alert = create_alert(pool, &sample(equipment.id), Utc::now()).await.unwrap();
        assert_eq!(alert.state, AlertState::Active);

        assert!(mark_notified(pool, alert.id, Utc::now()).await.unwrap());
        assert!(!mark_notified(pool, alert.id, Utc::now()).await.unwrap());
        assert!(mark_resolved(pool, alert.id, Utc::now()).await.unwrap());
        assert!(!mark_resolved(pool, alert.id, Utc::now()).await.unwrap());

        let resolved = get_alert(pool, alert.id).await.unwrap();
        assert!(resolved.notified_at.is_some());
        assert!(resolved.resolved_at.is_some());

        let err = mark_notified(pool, 999, Utc::now()).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_window() {
        let db = Database::connect_in_memory().await.unwrap();
        let pool = db.pool();
        let equipment = create_equipment(pool, &NewEquipment::new("E")).await.unwrap();
        let now = Utc::now();
        create_alert(pool, &sample(equipment.id), now).await.unwrap();

        let within = find_recent_duplicate(pool, equipment.id, 7, now - Duration::hours(24))
            .await
            .unwrap();
        assert!(within.is_some());

        let after = find_recent_duplicate(pool, equipment.id, 7, now + Duration::seconds(1))
            .await
            .unwrap();
        assert!(after.is_none());

        assert_eq!(list_alerts(pool, Some(AlertState::Active)).await.unwrap().len(), 1);
        assert!(list_alerts(pool, Some(AlertState::Resolved)).await.unwrap().is_empty());
    }
}
