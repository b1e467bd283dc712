//! Equipment CRUD operations.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::{encode_cadences, Equipment, NewEquipment};
use crate::validation::validate_equipment;

const EQUIPMENT_COLUMNS: &str = r#"
    id, uuid, name, customer_id, site_id, type_id, nr12_active, cadences, hour_meter, created_at
"#;

/// Create equipment with a freshly generated UUID.
pub async fn create_equipment(pool: &SqlitePool, equipment: &NewEquipment) -> Result<Equipment> {
    validate_equipment(equipment)?;

    let uuid = Uuid::new_v4().to_string();
    let result = sqlx::query(
        r#"
        INSERT INTO equipment
            (uuid, name, customer_id, site_id, type_id, nr12_active, cadences, hour_meter)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&uuid)
    .bind(equipment.name.trim())
    .bind(equipment.customer_id)
    .bind(equipment.site_id)
    .bind(equipment.type_id)
    .bind(equipment.nr12_active)
    .bind(encode_cadences(&equipment.cadences))
    .bind(equipment.hour_meter)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "Equipment", uuid.clone()))?;

    get_equipment(pool, result.last_insert_rowid()).await
}

/// Get equipment by ID.
pub async fn get_equipment(pool: &SqlitePool, id: i64) -> Result<Equipment> {
    let sql = format!("SELECT {} FROM equipment WHERE id = ?", EQUIPMENT_COLUMNS);
    sqlx::query_as::<_, Equipment>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "Equipment",
            id: id.to_string(),
        })
}

/// Get equipment by its UUID (case-insensitive).
pub async fn get_equipment_by_uuid(pool: &SqlitePool, uuid: &str) -> Result<Equipment> {
    let sql = format!("SELECT {} FROM equipment WHERE uuid = ?", EQUIPMENT_COLUMNS);
    sqlx::query_as::<_, Equipment>(&sql)
        .bind(uuid.trim().to_ascii_lowercase())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "Equipment",
            id: uuid.to_string(),
        })
}

/// List NR12-active equipment that has a type, by id.
pub async fn list_nr12_active(pool: &SqlitePool) -> Result<Vec<Equipment>> {
    let sql = format!(
        "SELECT {} FROM equipment WHERE nr12_active = 1 AND type_id IS NOT NULL ORDER BY id",
        EQUIPMENT_COLUMNS
    );
    let rows = sqlx::query_as::<_, Equipment>(&sql).fetch_all(pool).await?;

    Ok(rows)
}

/// Replace the NR12 configuration of equipment.
pub async fn update_nr12(pool: &SqlitePool, id: i64, config: &NewEquipment) -> Result<()> {
    validate_equipment(config)?;

    let result = sqlx::query(
        r#"
        UPDATE equipment
        SET name = ?, type_id = ?, nr12_active = ?, cadences = ?
        WHERE id = ?
        "#,
    )
    .bind(config.name.trim())
    .bind(config.type_id)
    .bind(config.nr12_active)
    .bind(encode_cadences(&config.cadences))
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Equipment",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Record a new hour-meter reading.
pub async fn set_hour_meter(pool: &SqlitePool, id: i64, reading: f64) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE equipment
        SET hour_meter = ?
        WHERE id = ?
        "#,
    )
    .bind(reading)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Equipment",
            id: id.to_string(),
        });
    }

    Ok(())
}
