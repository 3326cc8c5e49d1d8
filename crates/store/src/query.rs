use chrono::{DateTime, Utc};
use common::{TenantId, VariantId, WarehouseId};
use domain::{InventoryItem, MovementType, ReservationStatus, StockMovement};
use rust_decimal::Decimal;

/// Default page size when a query does not set one.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page a single query may request.
pub const MAX_PAGE_SIZE: usize = 500;

/// One page of results plus the total number of matches.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
}

impl<T> Page<T> {
    /// Returns true if more results exist after this page.
    pub fn has_more(&self) -> bool {
        (self.offset + self.items.len()) < self.total as usize
    }

    /// Maps the items, keeping the paging information.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Builder for stock movement history queries.
///
/// Always scoped to one tenant; every other filter is optional.
#[derive(Debug, Clone)]
pub struct MovementQuery {
    pub tenant_id: TenantId,

    /// Filter by variant.
    pub variant_id: Option<VariantId>,

    /// Filter by warehouse.
    pub warehouse_id: Option<WarehouseId>,

    /// Filter by movement types (any of these types).
    pub movement_types: Option<Vec<MovementType>>,

    /// Filter by correlation reference (exact match).
    pub reference: Option<String>,

    /// Filter by movements at or after this timestamp.
    pub from_timestamp: Option<DateTime<Utc>>,

    /// Filter by movements at or before this timestamp.
    pub to_timestamp: Option<DateTime<Utc>>,

    /// Maximum number of movements to return.
    pub limit: Option<usize>,

    /// Number of movements to skip.
    pub offset: Option<usize>,
}

impl MovementQuery {
    /// Creates a query over every movement of a tenant.
    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            variant_id: None,
            warehouse_id: None,
            movement_types: None,
            reference: None,
            from_timestamp: None,
            to_timestamp: None,
            limit: None,
            offset: None,
        }
    }

    pub fn variant(mut self, variant_id: VariantId) -> Self {
        self.variant_id = Some(variant_id);
        self
    }

    pub fn warehouse(mut self, warehouse_id: WarehouseId) -> Self {
        self.warehouse_id = Some(warehouse_id);
        self
    }

    pub fn movement_type(mut self, movement_type: MovementType) -> Self {
        self.movement_types = Some(vec![movement_type]);
        self
    }

    pub fn movement_types(mut self, movement_types: Vec<MovementType>) -> Self {
        self.movement_types = Some(movement_types);
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn from_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    pub fn to_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Page size after applying the default and the cap.
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn effective_offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }

    /// Returns true if `movement` passes every filter.
    pub fn matches(&self, movement: &StockMovement) -> bool {
        movement.tenant_id == self.tenant_id
            && self.variant_id.is_none_or(|v| movement.variant_id == v)
            && self.warehouse_id.is_none_or(|w| movement.warehouse_id == w)
            && self
                .movement_types
                .as_ref()
                .is_none_or(|types| types.contains(&movement.movement_type))
            && self
                .reference
                .as_deref()
                .is_none_or(|r| movement.reference.as_deref() == Some(r))
            && self.from_timestamp.is_none_or(|from| movement.occurred_at >= from)
            && self.to_timestamp.is_none_or(|to| movement.occurred_at <= to)
    }
}

/// Builder for reservation listings.
#[derive(Debug, Clone)]
pub struct ReservationQuery {
    pub tenant_id: TenantId,
    pub status: Option<ReservationStatus>,
    pub variant_id: Option<VariantId>,
    pub warehouse_id: Option<WarehouseId>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ReservationQuery {
    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            status: None,
            variant_id: None,
            warehouse_id: None,
            limit: None,
            offset: None,
        }
    }

    pub fn status(mut self, status: ReservationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn variant(mut self, variant_id: VariantId) -> Self {
        self.variant_id = Some(variant_id);
        self
    }

    pub fn warehouse(mut self, warehouse_id: WarehouseId) -> Self {
        self.warehouse_id = Some(warehouse_id);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn effective_offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

/// An inventory item whose available stock is at or below its variant's threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct LowStockEntry {
    pub item: InventoryItem,
    pub sku: String,
    pub threshold: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::{ActorId, MovementId};
    use domain::{EntryType, StockKey};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn movement(key: StockKey, movement_type: MovementType, reference: Option<&str>) -> StockMovement {
        StockMovement {
            id: MovementId::new(),
            tenant_id: key.tenant_id,
            inventory_item_id: common::InventoryItemId::new(),
            variant_id: key.variant_id,
            warehouse_id: key.warehouse_id,
            movement_type,
            entry_type: EntryType::Debit,
            quantity: dec!(1),
            running_balance: dec!(1),
            reason: "test".to_string(),
            actor: ActorId::system(),
            occurred_at: Utc::now(),
            reference: reference.map(str::to_string),
            metadata: HashMap::new(),
            paired_movement_id: None,
        }
    }

    #[test]
    fn limit_defaults_and_caps() {
        let query = MovementQuery::for_tenant(TenantId::new());
        assert_eq!(query.effective_limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(query.clone().limit(10_000).effective_limit(), MAX_PAGE_SIZE);
        assert_eq!(query.limit(0).effective_limit(), 1);
    }

    #[test]
    fn filters_combine() {
        let key = StockKey::new(TenantId::new(), VariantId::new(), WarehouseId::new());
        let sale = movement(key, MovementType::Sale, Some("S-1"));

        let query = MovementQuery::for_tenant(key.tenant_id)
            .variant(key.variant_id)
            .movement_type(MovementType::Sale)
            .reference("S-1");
        assert!(query.matches(&sale));

        assert!(!query.clone().reference("S-2").matches(&sale));
        assert!(!query.clone().warehouse(WarehouseId::new()).matches(&sale));
        assert!(!query
            .from_timestamp(Utc::now() + Duration::hours(1))
            .matches(&sale));
        assert!(!MovementQuery::for_tenant(TenantId::new()).matches(&sale));
    }

    #[test]
    fn page_has_more() {
        let page = Page {
            items: vec![1, 2],
            total: 5,
            limit: 2,
            offset: 2,
        };
        assert!(page.has_more());
        let page = page.map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(Page { items: vec![5], total: 5, limit: 2, offset: 4 }.has_more(), false);
    }
}
