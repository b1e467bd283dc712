//! Operator CRUD operations and authorization sets.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{Equipment, Operator, OperatorStatus, Permissions};
use crate::validation::{validate_name, validate_operator_code};

const OPERATOR_COLUMNS: &str = r#"
    id, code, name, status, bot_active, chat_id, last_access, permissions
"#;

/// Create an operator.
///
/// When `code` is `None` the next free `OPnnnn` code is assigned.
pub async fn create_operator(
    pool: &SqlitePool,
    name: &str,
    code: Option<&str>,
    permissions: Permissions,
) -> Result<Operator> {
    validate_name("name", name)?;

    let code = match code {
        Some(code) => {
            validate_operator_code(code)?;
            code.trim().to_ascii_uppercase()
        }
        None => next_operator_code(pool).await?,
    };

    let result = sqlx::query(
        r#"
        INSERT INTO operators (code, name, permissions)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(&code)
    .bind(name.trim())
    .bind(permissions)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "Operator", code.clone()))?;

    get_operator(pool, result.last_insert_rowid()).await
}

async fn next_operator_code(pool: &SqlitePool) -> Result<String> {
    let next: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) + 1 FROM operators")
        .fetch_one(pool)
        .await?;

    Ok(format!("OP{:04}", next))
}

/// Get an operator by ID.
pub async fn get_operator(pool: &SqlitePool, id: i64) -> Result<Operator> {
    let sql = format!("SELECT {} FROM operators WHERE id = ?", OPERATOR_COLUMNS);
    sqlx::query_as::<_, Operator>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "Operator",
            id: id.to_string(),
        })
}

/// Get an operator by code (case-insensitive).
pub async fn get_operator_by_code(pool: &SqlitePool, code: &str) -> Result<Operator> {
    let code = code.trim().to_ascii_uppercase();
    let sql = format!("SELECT {} FROM operators WHERE code = ?", OPERATOR_COLUMNS);
    sqlx::query_as::<_, Operator>(&sql)
        .bind(&code)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "Operator",
            id: code.clone(),
        })
}

/// Get the operator bound to a chat, if any.
pub async fn get_operator_by_chat_id(pool: &SqlitePool, chat_id: i64) -> Result<Option<Operator>> {
    let sql = format!("SELECT {} FROM operators WHERE chat_id = ?", OPERATOR_COLUMNS);
    let operator = sqlx::query_as::<_, Operator>(&sql)
        .bind(chat_id)
        .fetch_optional(pool)
        .await?;

    Ok(operator)
}

/// Bind a chat to an operator and stamp last access.
///
/// The chat is first released from any other operator so it stays unique.
pub async fn bind_chat(
    pool: &SqlitePool,
    operator_id: i64,
    chat_id: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE operators
        SET chat_id = NULL
        WHERE chat_id = ? AND id != ?
        "#,
    )
    .bind(chat_id)
    .bind(operator_id)
    .execute(&mut *tx)
    .await?;

    let result = sqlx::query(
        r#"
        UPDATE operators
        SET chat_id = ?, last_access = ?
        WHERE id = ?
        "#,
    )
    .bind(chat_id)
    .bind(now)
    .bind(operator_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Operator",
            id: operator_id.to_string(),
        });
    }

    tx.commit().await?;
    Ok(())
}

/// Release the chat of an operator.
pub async fn unbind_chat(pool: &SqlitePool, operator_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE operators
        SET chat_id = NULL
        WHERE id = ?
        "#,
    )
    .bind(operator_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn set_status(pool: &SqlitePool, operator_id: i64, status: OperatorStatus) -> Result<()> {
    let result = sqlx::query("UPDATE operators SET status = ? WHERE id = ?")
        .bind(status)
        .bind(operator_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Operator",
            id: operator_id.to_string(),
        });
    }

    Ok(())
}

pub async fn set_bot_active(pool: &SqlitePool, operator_id: i64, active: bool) -> Result<()> {
    let result = sqlx::query("UPDATE operators SET bot_active = ? WHERE id = ?")
        .bind(active)
        .bind(operator_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Operator",
            id: operator_id.to_string(),
        });
    }

    Ok(())
}

/// Authorize an operator on one equipment. Idempotent.
pub async fn authorize_equipment(pool: &SqlitePool, operator_id: i64, equipment_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO operator_equipment (operator_id, equipment_id)
        VALUES (?, ?)
        "#,
    )
    .bind(operator_id)
    .bind(equipment_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Authorize an operator on every equipment of a customer. Idempotent.
pub async fn authorize_customer(pool: &SqlitePool, operator_id: i64, customer_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO operator_customers (operator_id, customer_id)
        VALUES (?, ?)
        "#,
    )
    .bind(operator_id)
    .bind(customer_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Authorize an operator on every equipment of a site. Idempotent.
pub async fn authorize_site(pool: &SqlitePool, operator_id: i64, site_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO operator_sites (operator_id, site_id)
        VALUES (?, ?)
        "#,
    )
    .bind(operator_id)
    .bind(site_id)
    .execute(pool)
    .await?;

    Ok(())
}

async fn count_links(pool: &SqlitePool, table: &str, operator_id: i64) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE operator_id = ?", table);
    let count: i64 = sqlx::query_scalar(&sql)
        .bind(operator_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// NR12-active equipment the operator may work on, by name.
///
/// Explicit equipment grants win over customer grants, which win over
/// site grants. An operator without any grant sees all NR12 equipment.
pub async fn authorized_equipment(pool: &SqlitePool, operator_id: i64) -> Result<Vec<Equipment>> {
    let filter = if count_links(pool, "operator_equipment", operator_id).await? > 0 {
        "AND e.id IN (SELECT equipment_id FROM operator_equipment WHERE operator_id = ?)"
    } else if count_links(pool, "operator_customers", operator_id).await? > 0 {
        "AND e.customer_id IN (SELECT customer_id FROM operator_customers WHERE operator_id = ?)"
    } else if count_links(pool, "operator_sites", operator_id).await? > 0 {
        "AND e.site_id IN (SELECT site_id FROM operator_sites WHERE operator_id = ?)"
    } else {
        "AND ? IS NOT NULL"
    };

    let sql = format!(
        r#"
        SELECT e.id, e.uuid, e.name, e.customer_id, e.site_id, e.type_id,
               e.nr12_active, e.cadences, e.hour_meter, e.created_at
        FROM equipment e
        WHERE e.nr12_active = 1 AND e.type_id IS NOT NULL
        {}
        ORDER BY e.name, e.id
        "#,
        filter
    );

    let rows = sqlx::query_as::<_, Equipment>(&sql)
        .bind(operator_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}
