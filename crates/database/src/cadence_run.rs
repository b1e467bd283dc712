//! Last date each (equipment, cadence) was satisfied by the scheduler.

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::Cadence;

/// Last generated date for a cadence, if it was ever satisfied.
pub async fn last_generated(
    pool: &SqlitePool,
    equipment_id: i64,
    cadence: Cadence,
) -> Result<Option<NaiveDate>> {
    let date = sqlx::query_scalar::<_, NaiveDate>(
        r#"
        SELECT last_generated
        FROM cadence_runs
        WHERE equipment_id = ? AND cadence = ?
        "#,
    )
    .bind(equipment_id)
    .bind(cadence)
    .fetch_optional(pool)
    .await?;

    Ok(date)
}

/// Record that a cadence was satisfied on `date`. Never moves backwards.
pub async fn mark_generated(
    pool: &SqlitePool,
    equipment_id: i64,
    cadence: Cadence,
    date: NaiveDate,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO cadence_runs (equipment_id, cadence, last_generated)
        VALUES (?, ?, ?)
        ON CONFLICT (equipment_id, cadence) DO UPDATE
        SET last_generated = MAX(last_generated, excluded.last_generated)
        "#,
    )
    .bind(equipment_id)
    .bind(cadence)
    .bind(date)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equipment::create_equipment;
    use crate::models::NewEquipment;
    use crate::Database;

    #[tokio::test]
    async fn test_mark_never_moves_backwards() {
        let db = Database::connect_in_memory().await.unwrap();
        let pool = db.pool();
        let equipment = create_equipment(pool, &NewEquipment::new("E")).await.unwrap();
        let later = NaiveDate::from_ymd_opt(2025, 2, 3).unwrap();
        let earlier = NaiveDate::from_ymd_opt(2025, 1, 27).unwrap();

        assert_eq!(last_generated(pool, equipment.id, Cadence::Weekly).await.unwrap(), None);
        mark_generated(pool, equipment.id, Cadence::Weekly, later).await.unwrap();
        mark_generated(pool, equipment.id, Cadence::Weekly, earlier).await.unwrap();

        assert_eq!(
            last_generated(pool, equipment.id, Cadence::Weekly).await.unwrap(),
            Some(later)
        );
    }
}
