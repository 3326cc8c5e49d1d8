//! Stock locations.

use chrono::{DateTime, Utc};
use common::{ActorId, TenantId, WarehouseId};
use serde::{Deserialize, Serialize};

use super::{CatalogError, require};

/// A physical location stock is held in. `code` is unique per tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub tenant_id: TenantId,
    pub code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<ActorId>,
}

impl Warehouse {
    pub fn new(
        tenant_id: TenantId,
        code: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            id: WarehouseId::new(),
            tenant_id,
            code: require(code, "warehouse code")?.to_uppercase(),
            name: require(name, "warehouse name")?,
            created_at: now,
            deleted_at: None,
            deleted_by: None,
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
