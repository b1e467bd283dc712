//! Equipment types and their standard checklist items.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{EquipmentType, NewStandardItem, StandardItem};
use crate::validation::validate_name;

const STANDARD_ITEM_COLUMNS: &str = r#"
    id, type_id, ordinal, text, description, criticality,
    requires_observation, allows_na, active
"#;

/// Create an equipment type and return its id.
pub async fn create_type(pool: &SqlitePool, name: &str, description: &str) -> Result<i64> {
    validate_name("name", name)?;

    let result = sqlx::query(
        r#"
        INSERT INTO equipment_types (name, description)
        VALUES (?, ?)
        "#,
    )
    .bind(name.trim())
    .bind(description)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "EquipmentType", name))?;

    Ok(result.last_insert_rowid())
}

/// Get an equipment type by ID.
pub async fn get_type(pool: &SqlitePool, id: i64) -> Result<EquipmentType> {
    sqlx::query_as::<_, EquipmentType>(
        r#"
        SELECT id, name, description, created_at
        FROM equipment_types
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "EquipmentType",
        id: id.to_string(),
    })
}

/// List all equipment types by name.
pub async fn list_types(pool: &SqlitePool) -> Result<Vec<EquipmentType>> {
    let types = sqlx::query_as::<_, EquipmentType>(
        r#"
        SELECT id, name, description, created_at
        FROM equipment_types
        ORDER BY name
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(types)
}

/// Add a standard item to a type and return its id.
///
/// Fails with `AlreadyExists` when another active item of the type holds the ordinal.
pub async fn add_standard_item(
    pool: &SqlitePool,
    type_id: i64,
    item: &NewStandardItem,
) -> Result<i64> {
    validate_name("text", &item.text)?;

    let result = sqlx::query(
        r#"
        INSERT INTO standard_items
            (type_id, ordinal, text, description, criticality, requires_observation, allows_na)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(type_id)
    .bind(item.ordinal)
    .bind(item.text.trim())
    .bind(&item.description)
    .bind(item.criticality)
    .bind(item.requires_observation)
    .bind(item.allows_na)
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::from_insert(e, "StandardItem", format!("{}/{}", type_id, item.ordinal))
    })?;

    Ok(result.last_insert_rowid())
}

/// Get a standard item by ID.
pub async fn get_standard_item(pool: &SqlitePool, id: i64) -> Result<StandardItem> {
    let sql = format!("SELECT {} FROM standard_items WHERE id = ?", STANDARD_ITEM_COLUMNS);
    sqlx::query_as::<_, StandardItem>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "StandardItem",
            id: id.to_string(),
        })
}

/// Active items of a type in presentation order.
///
/// Ties on ordinal (only possible across deactivations) break on insertion id.
pub async fn active_items_for_type(pool: &SqlitePool, type_id: i64) -> Result<Vec<StandardItem>> {
    let sql = format!(
        "SELECT {} FROM standard_items WHERE type_id = ? AND active = 1 ORDER BY ordinal, id",
        STANDARD_ITEM_COLUMNS
    );
    let items = sqlx::query_as::<_, StandardItem>(&sql)
        .bind(type_id)
        .fetch_all(pool)
        .await?;

    Ok(items)
}

/// Whether any checklist item references the standard item.
pub async fn is_referenced(pool: &SqlitePool, standard_item_id: i64) -> Result<bool> {
    let found = sqlx::query_scalar::<_, i32>(
        r#"
        SELECT 1
        FROM checklist_items
        WHERE standard_item_id = ?
        LIMIT 1
        "#,
    )
    .bind(standard_item_id)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

/// Edit a standard item that no checklist references yet.
pub async fn update_standard_item(
    pool: &SqlitePool,
    id: i64,
    item: &NewStandardItem,
) -> Result<()> {
    validate_name("text", &item.text)?;

    if is_referenced(pool, id).await? {
        return Err(DatabaseError::Immutable {
            entity: "StandardItem",
            id: id.to_string(),
        });
    }

    let result = sqlx::query(
        r#"
        UPDATE standard_items
        SET ordinal = ?, text = ?, description = ?, criticality = ?,
            requires_observation = ?, allows_na = ?
        WHERE id = ?
        "#,
    )
    .bind(item.ordinal)
    .bind(item.text.trim())
    .bind(&item.description)
    .bind(item.criticality)
    .bind(item.requires_observation)
    .bind(item.allows_na)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "StandardItem", id.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "StandardItem",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Deactivate a standard item. Existing checklists keep their snapshot.
pub async fn deactivate_standard_item(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE standard_items
        SET active = 0
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "StandardItem",
            id: id.to_string(),
        });
    }

    Ok(())
}
