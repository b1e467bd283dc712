//! Checklist persistence.
//!
//! A checklist is created together with its item snapshot in one
//! transaction. State changes are conditional updates so that two writers
//! racing on the same row cannot both win.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::{Cadence, Checklist, ChecklistState, Shift, StandardItem};

const CHECKLIST_COLUMNS: &str = r#"
    id, uuid, equipment_id, date, shift, cadence, responsible_operator_id, state,
    started_at, completed_at, needs_maintenance, notes, hour_meter_start, hour_meter_end,
    created_at
"#;

/// Values for a new checklist.
#[derive(Debug, Clone)]
pub struct NewChecklist {
    pub equipment_id: i64,
    pub date: NaiveDate,
    pub shift: Shift,
    pub cadence: Cadence,
    /// Set when the creator claims the checklist on creation.
    pub responsible_operator_id: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub hour_meter_start: Option<f64>,
}

impl NewChecklist {
    pub fn pending(equipment_id: i64, date: NaiveDate, shift: Shift, cadence: Cadence) -> Self {
        Self {
            equipment_id,
            date,
            shift,
            cadence,
            responsible_operator_id: None,
            started_at: None,
            hour_meter_start: None,
        }
    }

    /// Create already claimed by an operator, in progress.
    pub fn claimed_by(mut self, operator_id: i64, now: DateTime<Utc>) -> Self {
        self.responsible_operator_id = Some(operator_id);
        self.started_at = Some(now);
        self
    }

    fn state(&self) -> ChecklistState {
        if self.responsible_operator_id.is_some() {
            ChecklistState::InProgress
        } else {
            ChecklistState::Pending
        }
    }
}

/// Answered versus total items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub answered: i64,
    pub total: i64,
}

impl Progress {
    /// Percentage answered, rounded to one decimal.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let raw = self.answered as f64 * 100.0 / self.total as f64;
        (raw * 10.0).round() / 10.0
    }

    pub fn is_complete(&self) -> bool {
        self.answered == self.total
    }
}

/// Create a checklist and snapshot its items.
///
/// Fails with `AlreadyExists` when a checklist already holds the
/// (equipment, date, shift) slot.
pub async fn create_with_items(
    pool: &SqlitePool,
    new: &NewChecklist,
    items: &[StandardItem],
) -> Result<Checklist> {
    let uuid = Uuid::new_v4().to_string();
    let slot = format!("{}/{}/{}", new.equipment_id, new.date, new.shift.as_str());

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO checklists
            (uuid, equipment_id, date, shift, cadence, responsible_operator_id, state,
             started_at, hour_meter_start)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&uuid)
    .bind(new.equipment_id)
    .bind(new.date)
    .bind(new.shift)
    .bind(new.cadence)
    .bind(new.responsible_operator_id)
    .bind(new.state())
    .bind(new.started_at)
    .bind(new.hour_meter_start)
    .execute(&mut *tx)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "Checklist", slot))?;

    let checklist_id = result.last_insert_rowid();

    for item in items {
        sqlx::query(
            r#"
            INSERT INTO checklist_items
                (checklist_id, standard_item_id, ordinal, text, description, criticality,
                 requires_observation, allows_na)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(checklist_id)
        .bind(item.id)
        .bind(item.ordinal)
        .bind(&item.text)
        .bind(&item.description)
        .bind(item.criticality)
        .bind(item.requires_observation)
        .bind(item.allows_na)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    get_checklist(pool, checklist_id).await
}

/// Get a checklist by ID.
pub async fn get_checklist(pool: &SqlitePool, id: i64) -> Result<Checklist> {
    let sql = format!("SELECT {} FROM checklists WHERE id = ?", CHECKLIST_COLUMNS);
    sqlx::query_as::<_, Checklist>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "Checklist",
            id: id.to_string(),
        })
}

/// Get a checklist by UUID (case-insensitive).
pub async fn get_checklist_by_uuid(pool: &SqlitePool, uuid: &str) -> Result<Checklist> {
    let sql = format!("SELECT {} FROM checklists WHERE uuid = ?", CHECKLIST_COLUMNS);
    sqlx::query_as::<_, Checklist>(&sql)
        .bind(uuid.trim().to_ascii_lowercase())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "Checklist",
            id: uuid.to_string(),
        })
}

/// The checklist occupying an (equipment, date, shift) slot.
pub async fn find_checklist(
    pool: &SqlitePool,
    equipment_id: i64,
    date: NaiveDate,
    shift: Shift,
) -> Result<Option<Checklist>> {
    let sql = format!(
        "SELECT {} FROM checklists WHERE equipment_id = ? AND date = ? AND shift = ?",
        CHECKLIST_COLUMNS
    );
    let checklist = sqlx::query_as::<_, Checklist>(&sql)
        .bind(equipment_id)
        .bind(date)
        .bind(shift)
        .fetch_optional(pool)
        .await?;

    Ok(checklist)
}

/// All checklists of an equipment for a date, in shift creation order.
pub async fn list_for_equipment_on(
    pool: &SqlitePool,
    equipment_id: i64,
    date: NaiveDate,
) -> Result<Vec<Checklist>> {
    let sql = format!(
        "SELECT {} FROM checklists WHERE equipment_id = ? AND date = ? ORDER BY id",
        CHECKLIST_COLUMNS
    );
    let rows = sqlx::query_as::<_, Checklist>(&sql)
        .bind(equipment_id)
        .bind(date)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// PENDING checklists dated strictly before `date`.
pub async fn list_pending_before(pool: &SqlitePool, date: NaiveDate) -> Result<Vec<Checklist>> {
    let sql = format!(
        "SELECT {} FROM checklists WHERE state = 'PENDING' AND date < ? ORDER BY date, id",
        CHECKLIST_COLUMNS
    );
    let rows = sqlx::query_as::<_, Checklist>(&sql)
        .bind(date)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

pub(crate) const CLAIM_SQL: &str = r#"
    UPDATE checklists
    SET responsible_operator_id = ?,
        state = 'IN_PROGRESS',
        started_at = COALESCE(started_at, ?)
    WHERE id = ?
      AND state IN ('PENDING', 'IN_PROGRESS')
      AND (responsible_operator_id IS NULL OR responsible_operator_id = ?)
"#;

pub(crate) const START_ANONYMOUS_SQL: &str = r#"
    UPDATE checklists
    SET state = 'IN_PROGRESS',
        started_at = COALESCE(started_at, ?)
    WHERE id = ?
      AND state IN ('PENDING', 'IN_PROGRESS')
      AND responsible_operator_id IS NULL
"#;

/// Take the responsible slot and move the checklist to IN_PROGRESS.
///
/// Succeeds only while the checklist is open and the slot is empty or
/// already held by `operator_id`. Returns whether the claim took.
pub async fn claim(
    pool: &SqlitePool,
    checklist_id: i64,
    operator_id: i64,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(CLAIM_SQL)
        .bind(operator_id)
        .bind(now)
        .bind(checklist_id)
        .bind(operator_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Mark an open checklist COMPLETED once no item is pending.
///
/// Returns `false` if the checklist was not open or still has pending items.
pub async fn complete(
    pool: &SqlitePool,
    checklist_id: i64,
    needs_maintenance: bool,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE checklists
        SET state = 'COMPLETED',
            completed_at = ?,
            needs_maintenance = ?
        WHERE id = ?
          AND state IN ('PENDING', 'IN_PROGRESS')
          AND NOT EXISTS (
              SELECT 1 FROM checklist_items
              WHERE checklist_id = ? AND status = 'PENDING'
          )
        "#,
    )
    .bind(now)
    .bind(needs_maintenance)
    .bind(checklist_id)
    .bind(checklist_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Cancel a checklist on behalf of its responsible operator.
pub async fn cancel(pool: &SqlitePool, checklist_id: i64, operator_id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE checklists
        SET state = 'CANCELLED'
        WHERE id = ?
          AND state IN ('PENDING', 'IN_PROGRESS')
          AND responsible_operator_id = ?
        "#,
    )
    .bind(checklist_id)
    .bind(operator_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Answered and total item counts.
pub async fn progress(pool: &SqlitePool, checklist_id: i64) -> Result<Progress> {
    let (answered, total): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(CASE WHEN status != 'PENDING' THEN 1 ELSE 0 END), 0),
               COUNT(*)
        FROM checklist_items
        WHERE checklist_id = ?
        "#,
    )
    .bind(checklist_id)
    .fetch_one(pool)
    .await?;

    Ok(Progress { answered, total })
}
