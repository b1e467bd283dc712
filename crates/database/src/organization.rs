//! Customers and sites, the owners of equipment.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{Customer, Site};
use crate::validation::validate_name;

/// Create a customer and return its id.
pub async fn create_customer(pool: &SqlitePool, name: &str) -> Result<i64> {
    validate_name("name", name)?;

    let result = sqlx::query(
        r#"
        INSERT INTO customers (name)
        VALUES (?)
        "#,
    )
    .bind(name.trim())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Create a site under a customer and return its id.
pub async fn create_site(pool: &SqlitePool, customer_id: i64, name: &str) -> Result<i64> {
    validate_name("name", name)?;

    let result = sqlx::query(
        r#"
        INSERT INTO sites (customer_id, name)
        VALUES (?, ?)
        "#,
    )
    .bind(customer_id)
    .bind(name.trim())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Get a customer by ID.
pub async fn get_customer(pool: &SqlitePool, id: i64) -> Result<Customer> {
    sqlx::query_as::<_, Customer>(
        r#"
        SELECT id, name
        FROM customers
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Customer",
        id: id.to_string(),
    })
}

/// List the sites of a customer.
pub async fn list_sites(pool: &SqlitePool, customer_id: i64) -> Result<Vec<Site>> {
    let sites = sqlx::query_as::<_, Site>(
        r#"
        SELECT id, customer_id, name
        FROM sites
        WHERE customer_id = ?
        ORDER BY name
        "#,
    )
    .bind(customer_id)
    .fetch_all(pool)
    .await?;

    Ok(sites)
}
