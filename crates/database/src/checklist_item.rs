//! Checklist item reads and answer writes.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::checklist::{CLAIM_SQL, START_ANONYMOUS_SQL};
use crate::error::{DatabaseError, Result};
use crate::models::{ChecklistItem, ItemStatus};

const ITEM_COLUMNS: &str = r#"
    id, checklist_id, standard_item_id, ordinal, text, description, criticality,
    requires_observation, allows_na, status, observation, verified_by, verified_at
"#;

/// Items of a checklist in presentation order.
pub async fn list_items(pool: &SqlitePool, checklist_id: i64) -> Result<Vec<ChecklistItem>> {
    let sql = format!(
        "SELECT {} FROM checklist_items WHERE checklist_id = ? ORDER BY ordinal, id",
        ITEM_COLUMNS
    );
    let items = sqlx::query_as::<_, ChecklistItem>(&sql)
        .bind(checklist_id)
        .fetch_all(pool)
        .await?;

    Ok(items)
}

/// Get a checklist item by ID.
pub async fn get_item(pool: &SqlitePool, id: i64) -> Result<ChecklistItem> {
    let sql = format!("SELECT {} FROM checklist_items WHERE id = ?", ITEM_COLUMNS);
    sqlx::query_as::<_, ChecklistItem>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "ChecklistItem",
            id: id.to_string(),
        })
}

/// The first PENDING item by ordinal, if any.
pub async fn next_pending(pool: &SqlitePool, checklist_id: i64) -> Result<Option<ChecklistItem>> {
    let sql = format!(
        "SELECT {} FROM checklist_items WHERE checklist_id = ? AND status = 'PENDING' ORDER BY ordinal, id LIMIT 1",
        ITEM_COLUMNS
    );
    let item = sqlx::query_as::<_, ChecklistItem>(&sql)
        .bind(checklist_id)
        .fetch_optional(pool)
        .await?;

    Ok(item)
}

const ANSWER_SQL: &str = r#"
    UPDATE checklist_items
    SET status = ?, observation = ?, verified_by = ?, verified_at = ?
    WHERE id = ?
      AND status = 'PENDING'
      AND checklist_id IN (
          SELECT id FROM checklists WHERE state IN ('PENDING', 'IN_PROGRESS')
      )
"#;

/// Record an answer on a PENDING item of an open checklist.
///
/// Returns `false` when the item was already answered or the checklist is
/// no longer open; nothing is written in that case.
pub async fn answer_item(
    pool: &SqlitePool,
    item_id: i64,
    status: ItemStatus,
    observation: &str,
    operator_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(ANSWER_SQL)
        .bind(status)
        .bind(observation)
        .bind(operator_id)
        .bind(now)
        .bind(item_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Outcome of [`submit_answers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitWrite {
    Applied,
    /// The checklist is closed or held by another operator.
    Held,
    /// Some item was no longer answerable.
    Stale,
}

/// Start the checklist and record several answers in one transaction.
///
/// With `operator_id` the responsible slot is claimed, otherwise the checklist
/// is started without one. Either everything is written, notes included, or
/// nothing is.
pub async fn submit_answers(
    pool: &SqlitePool,
    checklist_id: i64,
    operator_id: Option<i64>,
    answers: &[(i64, ItemStatus, String)],
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<SubmitWrite> {
    let mut tx = pool.begin().await?;

    let started = match operator_id {
        Some(id) => {
            sqlx::query(CLAIM_SQL)
                .bind(id)
                .bind(now)
                .bind(checklist_id)
                .bind(id)
                .execute(&mut *tx)
                .await?
        }
        None => {
            sqlx::query(START_ANONYMOUS_SQL)
                .bind(now)
                .bind(checklist_id)
                .execute(&mut *tx)
                .await?
        }
    };
    if started.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(SubmitWrite::Held);
    }

    for (item_id, status, observation) in answers {
        let result = sqlx::query(ANSWER_SQL)
            .bind(*status)
            .bind(observation.as_str())
            .bind(operator_id)
            .bind(now)
            .bind(*item_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(SubmitWrite::Stale);
        }
    }

    if let Some(notes) = notes {
        sqlx::query("UPDATE checklists SET notes = ? WHERE id = ?")
            .bind(notes)
            .bind(checklist_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(SubmitWrite::Applied)
}

/// Whether any item of the checklist was answered NOK.
pub async fn has_nok(pool: &SqlitePool, checklist_id: i64) -> Result<bool> {
    let found = sqlx::query_scalar::<_, i32>(
        r#"
        SELECT 1
        FROM checklist_items
        WHERE checklist_id = ? AND status = 'NOK'
        LIMIT 1
        "#,
    )
    .bind(checklist_id)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}
