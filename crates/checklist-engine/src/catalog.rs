//! Checklist catalog: equipment types and their ordered standard items.

use database::{catalog, Database, EquipmentType, StandardItem};

use crate::error::{EngineError, Result};

/// Read side of the catalog used when checklists are materialized.
#[derive(Debug, Clone)]
pub struct Catalog {
    db: Database,
}

impl Catalog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn list_types(&self) -> Result<Vec<EquipmentType>> {
        Ok(catalog::list_types(self.db.pool()).await?)
    }

    /// Active items of a type by `(ordinal, id)`.
    pub async fn items_for_type(&self, type_id: i64) -> Result<Vec<StandardItem>> {
        Ok(catalog::active_items_for_type(self.db.pool(), type_id).await?)
    }

    /// The `(ordinal, standard_item_id)` list a new checklist snapshots.
    pub async fn instantiate_items_for(&self, type_id: i64) -> Result<Vec<(i64, i64)>> {
        let items = self.snapshot_for(type_id).await?;
        Ok(items.iter().map(|i| (i.ordinal, i.id)).collect())
    }

    /// Items to snapshot into a new checklist.
    ///
    /// A type without active items cannot produce a checklist at all.
    pub async fn snapshot_for(&self, type_id: i64) -> Result<Vec<StandardItem>> {
        let items = self.items_for_type(type_id).await?;
        if items.is_empty() {
            return Err(EngineError::Fatal(format!(
                "equipment type {} has no active checklist items",
                type_id
            )));
        }
        Ok(items)
    }
}
