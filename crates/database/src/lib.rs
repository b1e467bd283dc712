//! SQLite persistence layer for the NR12 checklist system.
//!
//! This crate provides async database operations for the checklist catalog,
//! equipment, operators, checklists and maintenance alerts using SQLx with
//! SQLite. Each entity lives in its own module of free functions taking a
//! `&SqlitePool`.
//!
//! # Example
//!
//! ```no_run
//! use database::{catalog, models::{Criticality, NewStandardItem}, Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:data/mandacaru.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     // Define a type and its first check item
//!     let type_id = catalog::create_type(db.pool(), "Retroescavadeira", "").await?;
//!     let item = NewStandardItem::new(1, "Freio de estacionamento", Criticality::High);
//!     catalog::add_standard_item(db.pool(), type_id, &item).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod alert;
pub mod cadence_run;
pub mod catalog;
pub mod checklist;
pub mod checklist_item;
pub mod equipment;
pub mod error;
pub mod models;
pub mod operator;
pub mod organization;
pub mod validation;

pub use checklist::{NewChecklist, Progress};
pub use error::{DatabaseError, Result};
pub use models::{
    AlertKind, AlertState, Cadence, Checklist, ChecklistItem, ChecklistState, Criticality,
    Equipment, EquipmentType, ItemStatus, MaintenanceAlert, NewAlert, NewEquipment,
    NewStandardItem, Operator, OperatorStatus, Permissions, Shift, StandardItem,
};
pub use validation::ValidationError;

// Re-export sqlx for callers that match on driver errors
pub use sqlx;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    /// Set high enough for one writer per active chat plus the scheduler.
    const DEFAULT_POOL_SIZE: u32 = 20;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// let db = database::Database::connect("sqlite:data/mandacaru.db?mode=rwc").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Open a private in-memory database and migrate it.
    ///
    /// The pool holds a single connection that is never recycled, since every
    /// SQLite memory connection is its own database.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Normalise a path or URL into a `sqlite:` URL that creates the file.
pub fn sqlite_url(path_or_url: &str) -> String {
    if path_or_url.starts_with("sqlite:") {
        path_or_url.to_string()
    } else {
        format!("sqlite:{}?mode=rwc", path_or_url)
    }
}
