//! Inventory item aggregate: the sole authority over stock balances.

use chrono::{DateTime, NaiveDate, Utc};
use common::{ActorId, InventoryItemId, ReservationId, TenantId, VariantId, Version, WarehouseId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{InventoryError, MovementContext, MovementType, StockMovement};

/// Identity of an inventory item: one per variant and warehouse within a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub tenant_id: TenantId,
    pub variant_id: VariantId,
    pub warehouse_id: WarehouseId,
}

impl StockKey {
    pub fn new(tenant_id: TenantId, variant_id: VariantId, warehouse_id: WarehouseId) -> Self {
        Self {
            tenant_id,
            variant_id,
            warehouse_id,
        }
    }
}

impl std::fmt::Display for StockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.tenant_id, self.variant_id, self.warehouse_id)
    }
}

/// Result of releasing reserved stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseOutcome {
    /// Quantity actually released.
    pub released: Decimal,
    /// Requested quantity that could not be released because reserved stock hit zero.
    pub shortfall: Decimal,
}

impl ReleaseOutcome {
    pub fn was_floored(&self) -> bool {
        self.shortfall > Decimal::ZERO
    }
}

/// Raw field values used to rebuild an item from storage.
#[derive(Debug, Clone)]
pub struct InventoryItemParts {
    pub id: InventoryItemId,
    pub key: StockKey,
    pub total_stock: Decimal,
    pub reserved_stock: Decimal,
    pub allow_negative_stock: bool,
    pub expiry_date: Option<NaiveDate>,
    pub opened_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<ActorId>,
    pub version: Version,
}

/// Stock held for one variant in one warehouse.
///
/// Every quantity mutation appends exactly one [`StockMovement`] (two for a
/// transfer, one per side) and returns it, so the caller can persist the
/// balance and the ledger entry in the same transaction.
///
/// Invariants:
/// - `available_stock = total_stock - reserved_stock`
/// - `reserved_stock >= 0`
/// - `total_stock >= 0` and `reserved_stock <= total_stock` unless
///   `allow_negative_stock` is set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    id: InventoryItemId,
    key: StockKey,
    total_stock: Decimal,
    reserved_stock: Decimal,
    allow_negative_stock: bool,
    expiry_date: Option<NaiveDate>,
    opened_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<ActorId>,
    #[serde(default)]
    version: Version,
}

impl Aggregate for InventoryItem {
    fn aggregate_type() -> &'static str {
        "InventoryItem"
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}

// Construction
impl InventoryItem {
    /// Creates an item with no opening balance yet.
    pub fn new(
        key: StockKey,
        allow_negative_stock: bool,
        expiry_date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InventoryItemId::new(),
            key,
            total_stock: Decimal::ZERO,
            reserved_stock: Decimal::ZERO,
            allow_negative_stock,
            expiry_date,
            opened_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            deleted_by: None,
            version: Version::initial(),
        }
    }

    /// Rebuilds an item from persisted fields.
    pub fn rehydrate(parts: InventoryItemParts) -> Self {
        Self {
            id: parts.id,
            key: parts.key,
            total_stock: parts.total_stock,
            reserved_stock: parts.reserved_stock,
            allow_negative_stock: parts.allow_negative_stock,
            expiry_date: parts.expiry_date,
            opened_at: parts.opened_at,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
            deleted_at: parts.deleted_at,
            deleted_by: parts.deleted_by,
            version: parts.version,
        }
    }
}

// Query methods
impl InventoryItem {
    pub fn id(&self) -> InventoryItemId {
        self.id
    }

    pub fn key(&self) -> StockKey {
        self.key
    }

    pub fn tenant_id(&self) -> TenantId {
        self.key.tenant_id
    }

    pub fn variant_id(&self) -> VariantId {
        self.key.variant_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.key.warehouse_id
    }

    pub fn total_stock(&self) -> Decimal {
        self.total_stock
    }

    pub fn reserved_stock(&self) -> Decimal {
        self.reserved_stock
    }

    /// Total stock not held by reservations.
    pub fn available_stock(&self) -> Decimal {
        self.total_stock - self.reserved_stock
    }

    pub fn allow_negative_stock(&self) -> bool {
        self.allow_negative_stock
    }

    pub fn expiry_date(&self) -> Option<NaiveDate> {
        self.expiry_date
    }

    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn deleted_by(&self) -> Option<&ActorId> {
        self.deleted_by.as_ref()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns true once the opening balance has been recorded.
    pub fn has_opening_balance(&self) -> bool {
        self.opened_at.is_some()
    }
}

// Command methods
impl InventoryItem {
    /// Records the one-time opening balance.
    pub fn set_opening_balance(
        &mut self,
        quantity: Decimal,
        context: &MovementContext,
    ) -> Result<StockMovement, InventoryError> {
        if self.has_opening_balance() {
            return Err(InventoryError::OpeningBalanceExists {
                variant_id: self.key.variant_id,
                warehouse_id: self.key.warehouse_id,
            });
        }
        if quantity.is_sign_negative() && !quantity.is_zero() {
            return Err(InventoryError::InvalidQuantity {
                quantity,
                expected: "opening balance must not be negative",
            });
        }

        self.opened_at = Some(context.occurred_at);
        Ok(self.apply(MovementType::OpeningBalance, quantity, context))
    }

    /// Records received stock.
    pub fn record_purchase(
        &mut self,
        quantity: Decimal,
        context: &MovementContext,
    ) -> Result<StockMovement, InventoryError> {
        self.ensure_open()?;
        ensure_positive(quantity)?;
        Ok(self.apply(MovementType::Purchase, quantity, context))
    }

    /// Records stock returned against an earlier sale.
    ///
    /// The refundable remainder must already have been checked against the
    /// ledger; see [`super::RefundLedger`].
    pub fn record_refund(
        &mut self,
        quantity: Decimal,
        original_sale_reference: &str,
        context: &MovementContext,
    ) -> Result<StockMovement, InventoryError> {
        self.ensure_open()?;
        ensure_positive(quantity)?;
        if original_sale_reference.trim().is_empty() {
            return Err(InventoryError::InvalidInput(
                "original sale reference is required for a refund".to_string(),
            ));
        }

        let context = context
            .clone()
            .with_reference(original_sale_reference.to_string());
        Ok(self.apply(MovementType::Refund, quantity, &context))
    }

    /// Records sold stock.
    pub fn record_sale(
        &mut self,
        quantity: Decimal,
        context: &MovementContext,
    ) -> Result<StockMovement, InventoryError> {
        self.ensure_open()?;
        ensure_positive(quantity)?;
        self.ensure_available(quantity)?;
        Ok(self.apply(MovementType::Sale, -quantity, context))
    }

    /// Records a manual correction; `delta` is signed and must not be zero.
    pub fn record_adjustment(
        &mut self,
        delta: Decimal,
        context: &MovementContext,
    ) -> Result<StockMovement, InventoryError> {
        self.ensure_open()?;
        if delta.is_zero() {
            return Err(InventoryError::InvalidQuantity {
                quantity: delta,
                expected: "adjustment must not be zero",
            });
        }
        if context.reason.trim().is_empty() {
            return Err(InventoryError::InvalidInput(
                "a reason is required for stock adjustments".to_string(),
            ));
        }
        if delta.is_sign_negative() {
            self.ensure_available(-delta)?;
        }
        Ok(self.apply(MovementType::Adjustment, delta, context))
    }

    /// Records damaged, lost or expired stock.
    pub fn record_write_off(
        &mut self,
        quantity: Decimal,
        context: &MovementContext,
    ) -> Result<StockMovement, InventoryError> {
        self.ensure_open()?;
        ensure_positive(quantity)?;
        self.ensure_available(quantity)?;
        Ok(self.apply(MovementType::WriteOff, -quantity, context))
    }

    /// Moves stock between two warehouses holding the same variant.
    ///
    /// Returns `(outbound, inbound)`: a Credit on `source` and a Debit on
    /// `destination`, each pointing at the other through `paired_movement_id`.
    pub fn transfer(
        source: &mut InventoryItem,
        destination: &mut InventoryItem,
        quantity: Decimal,
        context: &MovementContext,
    ) -> Result<(StockMovement, StockMovement), InventoryError> {
        source.ensure_open()?;
        destination.ensure_open()?;
        ensure_positive(quantity)?;

        if source.key.tenant_id != destination.key.tenant_id
            || source.key.variant_id != destination.key.variant_id
        {
            return Err(InventoryError::InvalidInput(
                "transfers must move the same variant within one tenant".to_string(),
            ));
        }
        if source.key.warehouse_id == destination.key.warehouse_id {
            return Err(InventoryError::InvalidInput(
                "source and destination warehouse must differ".to_string(),
            ));
        }
        source.ensure_available(quantity)?;

        let mut outbound = source.apply(MovementType::Transfer, -quantity, context);
        let mut inbound = destination.apply(MovementType::Transfer, quantity, context);
        outbound.paired_movement_id = Some(inbound.id);
        inbound.paired_movement_id = Some(outbound.id);

        Ok((outbound, inbound))
    }

    /// Holds stock for a reservation. Does not touch the ledger.
    pub fn reserve_stock(
        &mut self,
        quantity: Decimal,
        reservation_id: ReservationId,
        at: DateTime<Utc>,
    ) -> Result<(), InventoryError> {
        self.ensure_open()?;
        ensure_positive(quantity)?;
        self.ensure_available(quantity)?;

        self.reserved_stock += quantity;
        self.updated_at = at;
        tracing::debug!(
            key = %self.key,
            %reservation_id,
            %quantity,
            reserved = %self.reserved_stock,
            "stock reserved"
        );
        Ok(())
    }

    /// Returns held stock to availability, never taking reserved stock below zero.
    ///
    /// Releasing more than is reserved is not rejected; the excess is reported
    /// in the outcome and logged, since it points at an earlier accounting error.
    pub fn release_reserved_stock(
        &mut self,
        quantity: Decimal,
        reservation_id: ReservationId,
        at: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, InventoryError> {
        self.ensure_open()?;
        ensure_positive(quantity)?;

        let released = quantity.min(self.reserved_stock);
        let outcome = ReleaseOutcome {
            released,
            shortfall: quantity - released,
        };

        if outcome.was_floored() {
            tracing::warn!(
                key = %self.key,
                %reservation_id,
                requested = %quantity,
                reserved = %self.reserved_stock,
                shortfall = %outcome.shortfall,
                "release exceeds reserved stock, flooring at zero"
            );
            metrics::counter!("inventory_reserved_release_floored").increment(1);
        }

        self.reserved_stock -= released;
        self.updated_at = at;
        Ok(outcome)
    }

    /// Changes item settings. `expiry_date` of `Some(None)` clears the date.
    pub fn update_settings(
        &mut self,
        allow_negative_stock: Option<bool>,
        expiry_date: Option<Option<NaiveDate>>,
        at: DateTime<Utc>,
    ) -> Result<(), InventoryError> {
        self.ensure_open()?;

        if allow_negative_stock == Some(false)
            && (self.total_stock < Decimal::ZERO || self.available_stock() < Decimal::ZERO)
        {
            return Err(InventoryError::BusinessRule(format!(
                "cannot disallow negative stock while available stock is {}",
                self.available_stock()
            )));
        }

        if let Some(allow) = allow_negative_stock {
            self.allow_negative_stock = allow;
        }
        if let Some(expiry) = expiry_date {
            self.expiry_date = expiry;
        }
        self.updated_at = at;
        Ok(())
    }

    /// Marks the item deleted. Refused while stock is reserved.
    pub fn soft_delete(&mut self, actor: ActorId, at: DateTime<Utc>) -> Result<(), InventoryError> {
        self.ensure_open()?;
        if self.reserved_stock > Decimal::ZERO {
            return Err(InventoryError::BusinessRule(format!(
                "cannot delete inventory with {} units reserved",
                self.reserved_stock
            )));
        }

        self.deleted_at = Some(at);
        self.deleted_by = Some(actor);
        self.updated_at = at;
        Ok(())
    }

    /// Applies a signed quantity and records the matching ledger entry.
    fn apply(
        &mut self,
        movement_type: MovementType,
        quantity: Decimal,
        context: &MovementContext,
    ) -> StockMovement {
        self.total_stock += quantity;
        self.updated_at = context.occurred_at;
        StockMovement::record(self, movement_type, quantity, context)
    }

    fn ensure_open(&self) -> Result<(), InventoryError> {
        if self.is_deleted() {
            return Err(InventoryError::NotFound {
                variant_id: self.key.variant_id,
                warehouse_id: self.key.warehouse_id,
            });
        }
        if !self.has_opening_balance() {
            return Err(InventoryError::BusinessRule(
                "opening balance has not been set".to_string(),
            ));
        }
        Ok(())
    }

    fn ensure_available(&self, quantity: Decimal) -> Result<(), InventoryError> {
        if !self.allow_negative_stock && self.available_stock() < quantity {
            return Err(InventoryError::InsufficientStock {
                requested: quantity,
                available: self.available_stock(),
            });
        }
        Ok(())
    }
}

fn ensure_positive(quantity: Decimal) -> Result<(), InventoryError> {
    if quantity <= Decimal::ZERO {
        return Err(InventoryError::InvalidQuantity {
            quantity,
            expected: "must be greater than 0",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::EntryType;
    use rust_decimal_macros::dec;

    fn ctx(reason: &str) -> MovementContext {
        MovementContext::new(reason, ActorId::new("tester"))
    }

    fn opened(quantity: Decimal) -> InventoryItem {
        let key = StockKey::new(TenantId::new(), VariantId::new(), WarehouseId::new());
        let mut item = InventoryItem::new(key, false, None, Utc::now());
        item.set_opening_balance(quantity, &ctx("opening")).unwrap();
        item
    }

    #[test]
    fn opening_balance_sets_total_and_records_entry() {
        let key = StockKey::new(TenantId::new(), VariantId::new(), WarehouseId::new());
        let mut item = InventoryItem::new(key, false, None, Utc::now());

        let movement = item.set_opening_balance(dec!(100), &ctx("opening")).unwrap();

        assert_eq!(item.total_stock(), dec!(100));
        assert!(item.has_opening_balance());
        assert_eq!(movement.movement_type, MovementType::OpeningBalance);
        assert_eq!(movement.entry_type, EntryType::Debit);
        assert_eq!(movement.running_balance, dec!(100));
        assert_eq!(movement.inventory_item_id, item.id());
    }

    #[test]
    fn second_opening_balance_fails_for_any_quantity() {
        let mut item = opened(dec!(10));
        for quantity in [dec!(0), dec!(10), dec!(99.5)] {
            let err = item.set_opening_balance(quantity, &ctx("again")).unwrap_err();
            assert!(matches!(err, InventoryError::OpeningBalanceExists { .. }));
        }
        assert_eq!(item.total_stock(), dec!(10));
    }

    #[test]
    fn negative_opening_balance_rejected() {
        let key = StockKey::new(TenantId::new(), VariantId::new(), WarehouseId::new());
        let mut item = InventoryItem::new(key, false, None, Utc::now());
        let err = item.set_opening_balance(dec!(-1), &ctx("opening")).unwrap_err();
        assert!(matches!(err, InventoryError::InvalidQuantity { .. }));
        assert!(!item.has_opening_balance());
    }

    #[test]
    fn mutations_require_an_opening_balance() {
        let key = StockKey::new(TenantId::new(), VariantId::new(), WarehouseId::new());
        let mut item = InventoryItem::new(key, false, None, Utc::now());
        let err = item.record_purchase(dec!(1), &ctx("po")).unwrap_err();
        assert!(matches!(err, InventoryError::BusinessRule(_)));
    }

    #[test]
    fn purchase_and_refund_reject_non_positive_quantities() {
        let mut item = opened(dec!(20));
        for quantity in [dec!(0), dec!(-3)] {
            let err = item.record_purchase(quantity, &ctx("po")).unwrap_err();
            assert_eq!(err.code(), crate::ErrorCode::InvalidQuantity);
            let err = item.record_refund(quantity, "SALE-1", &ctx("rma")).unwrap_err();
            assert_eq!(err.code(), crate::ErrorCode::InvalidQuantity);
        }
        assert_eq!(item.total_stock(), dec!(20));
    }

    #[test]
    fn opening_purchase_reserve_scenario() {
        let mut item = opened(dec!(100));
        item.record_purchase(dec!(50), &ctx("po")).unwrap();
        item.reserve_stock(dec!(30), ReservationId::new(), Utc::now())
            .unwrap();

        assert_eq!(item.total_stock(), dec!(150));
        assert_eq!(item.reserved_stock(), dec!(30));
        assert_eq!(item.available_stock(), dec!(120));
    }

    #[test]
    fn sale_records_negative_credit() {
        let mut item = opened(dec!(10));
        let movement = item
            .record_sale(dec!(4), &ctx("sale").with_reference("SALE-1"))
            .unwrap();

        assert_eq!(movement.quantity, dec!(-4));
        assert_eq!(movement.entry_type, EntryType::Credit);
        assert_eq!(movement.running_balance, dec!(6));
        assert_eq!(movement.reference.as_deref(), Some("SALE-1"));
    }

    #[test]
    fn sale_cannot_consume_reserved_stock() {
        let mut item = opened(dec!(10));
        item.reserve_stock(dec!(8), ReservationId::new(), Utc::now())
            .unwrap();

        let err = item.record_sale(dec!(3), &ctx("sale")).unwrap_err();
        assert_eq!(
            err,
            InventoryError::InsufficientStock {
                requested: dec!(3),
                available: dec!(2),
            }
        );
        assert_eq!(item.total_stock(), dec!(10));
    }

    #[test]
    fn negative_stock_allowed_when_enabled() {
        let key = StockKey::new(TenantId::new(), VariantId::new(), WarehouseId::new());
        let mut item = InventoryItem::new(key, true, None, Utc::now());
        item.set_opening_balance(dec!(1), &ctx("opening")).unwrap();

        let movement = item.record_sale(dec!(5), &ctx("backorder")).unwrap();
        assert_eq!(movement.running_balance, dec!(-4));
        assert_eq!(item.total_stock(), dec!(-4));
    }

    #[test]
    fn refund_is_tagged_with_original_sale_reference() {
        let mut item = opened(dec!(0));
        let movement = item
            .record_refund(dec!(2), "SALE-9", &ctx("customer return"))
            .unwrap();
        assert_eq!(movement.movement_type, MovementType::Refund);
        assert_eq!(movement.reference.as_deref(), Some("SALE-9"));
        assert_eq!(movement.entry_type, EntryType::Debit);
        assert_eq!(item.total_stock(), dec!(2));
    }

    #[test]
    fn adjustment_sign_decides_entry_side() {
        let mut item = opened(dec!(10));
        let up = item.record_adjustment(dec!(2), &ctx("count")).unwrap();
        let down = item.record_adjustment(dec!(-5), &ctx("count")).unwrap();

        assert_eq!(up.entry_type, EntryType::Debit);
        assert_eq!(down.entry_type, EntryType::Credit);
        assert_eq!(item.total_stock(), dec!(7));

        assert!(matches!(
            item.record_adjustment(dec!(0), &ctx("count")),
            Err(InventoryError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            item.record_adjustment(dec!(1), &ctx("  ")),
            Err(InventoryError::InvalidInput(_))
        ));
    }

    #[test]
    fn write_off_respects_availability() {
        let mut item = opened(dec!(3));
        assert!(matches!(
            item.record_write_off(dec!(4), &ctx("damaged")),
            Err(InventoryError::InsufficientStock { .. })
        ));
        let movement = item.record_write_off(dec!(3), &ctx("damaged")).unwrap();
        assert_eq!(movement.movement_type, MovementType::WriteOff);
        assert_eq!(item.total_stock(), dec!(0));
    }

    #[test]
    fn transfer_creates_paired_entries() {
        let mut source = opened(dec!(10));
        let dest_key = StockKey::new(source.tenant_id(), source.variant_id(), WarehouseId::new());
        let mut destination = InventoryItem::new(dest_key, false, None, Utc::now());
        destination
            .set_opening_balance(dec!(1), &ctx("opening"))
            .unwrap();

        let (outbound, inbound) = InventoryItem::transfer(
            &mut source,
            &mut destination,
            dec!(4),
            &ctx("rebalance").with_reference("TRF-1"),
        )
        .unwrap();

        assert_eq!(outbound.entry_type, EntryType::Credit);
        assert_eq!(inbound.entry_type, EntryType::Debit);
        assert_eq!(outbound.paired_movement_id, Some(inbound.id));
        assert_eq!(inbound.paired_movement_id, Some(outbound.id));
        assert_eq!(outbound.running_balance, dec!(6));
        assert_eq!(inbound.running_balance, dec!(5));
        assert_eq!(source.total_stock() + destination.total_stock(), dec!(11));
    }

    #[test]
    fn transfer_rejects_same_warehouse_and_other_variant() {
        let mut source = opened(dec!(10));
        let mut same = source.clone();
        assert!(matches!(
            InventoryItem::transfer(&mut source, &mut same, dec!(1), &ctx("x")),
            Err(InventoryError::InvalidInput(_))
        ));

        let mut other = opened(dec!(0));
        assert!(matches!(
            InventoryItem::transfer(&mut source, &mut other, dec!(1), &ctx("x")),
            Err(InventoryError::InvalidInput(_))
        ));
        assert_eq!(source.total_stock(), dec!(10));
    }

    #[test]
    fn reserve_fails_when_available_is_short() {
        let mut item = opened(dec!(5));
        let err = item
            .reserve_stock(dec!(6), ReservationId::new(), Utc::now())
            .unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::InsufficientStock);
        assert_eq!(item.reserved_stock(), dec!(0));
    }

    #[test]
    fn release_floors_at_zero_and_reports_shortfall() {
        let mut item = opened(dec!(10));
        let reservation = ReservationId::new();
        item.reserve_stock(dec!(3), reservation, Utc::now()).unwrap();

        let outcome = item
            .release_reserved_stock(dec!(5), reservation, Utc::now())
            .unwrap();

        assert_eq!(outcome.released, dec!(3));
        assert_eq!(outcome.shortfall, dec!(2));
        assert!(outcome.was_floored());
        assert_eq!(item.reserved_stock(), dec!(0));
    }

    #[test]
    fn reserve_and_release_leave_ledger_untouched() {
        let mut item = opened(dec!(10));
        let total = item.total_stock();
        let reservation = ReservationId::new();
        item.reserve_stock(dec!(2), reservation, Utc::now()).unwrap();
        item.release_reserved_stock(dec!(2), reservation, Utc::now())
            .unwrap();
        assert_eq!(item.total_stock(), total);
    }

    #[test]
    fn soft_delete_hides_item_from_mutations() {
        let mut item = opened(dec!(10));
        item.soft_delete(ActorId::new("admin"), Utc::now()).unwrap();

        assert!(item.is_deleted());
        assert!(matches!(
            item.record_purchase(dec!(1), &ctx("po")),
            Err(InventoryError::NotFound { .. })
        ));
    }

    #[test]
    fn soft_delete_refused_while_reserved() {
        let mut item = opened(dec!(10));
        item.reserve_stock(dec!(1), ReservationId::new(), Utc::now())
            .unwrap();
        assert!(matches!(
            item.soft_delete(ActorId::new("admin"), Utc::now()),
            Err(InventoryError::BusinessRule(_))
        ));
    }

    #[test]
    fn settings_update_and_guard() {
        let key = StockKey::new(TenantId::new(), VariantId::new(), WarehouseId::new());
        let mut item = InventoryItem::new(key, true, None, Utc::now());
        item.set_opening_balance(dec!(0), &ctx("opening")).unwrap();
        item.record_sale(dec!(2), &ctx("backorder")).unwrap();

        assert!(item.update_settings(Some(false), None, Utc::now()).is_err());

        let expiry = NaiveDate::from_ymd_opt(2030, 1, 31);
        item.update_settings(None, Some(expiry), Utc::now()).unwrap();
        assert_eq!(item.expiry_date(), expiry);
        item.update_settings(None, Some(None), Utc::now()).unwrap();
        assert_eq!(item.expiry_date(), None);
    }
}
