//! Commands accepted by the application services.
//!
//! Each command carries the tenant and actor it runs for; the derived
//! validators run before a transaction is opened.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use common::{ActorId, ProductId, ReservationId, TenantId, VariantId, WarehouseId};
use domain::{MovementContext, StockKey};
use rust_decimal::Decimal;
use validator::Validate;

use crate::validation::{non_negative_quantity, non_zero_quantity, not_blank, positive_quantity};

/// Who, why and which external document, shared by every ledger command.
#[derive(Debug, Clone, Validate)]
pub struct MovementDetails {
    #[validate(length(max = 500))]
    pub reason: String,
    #[validate(length(min = 1, max = 255))]
    pub reference: Option<String>,
    pub metadata: HashMap<String, String>,
    pub actor: ActorId,
}

impl MovementDetails {
    pub fn new(reason: impl Into<String>, actor: ActorId) -> Self {
        Self {
            reason: reason.into(),
            reference: None,
            metadata: HashMap::new(),
            actor,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub(crate) fn context(&self, now: DateTime<Utc>) -> MovementContext {
        MovementContext::new(self.reason.clone(), self.actor.clone())
            .with_optional_reference(self.reference.clone())
            .with_metadata(self.metadata.clone())
            .at(now)
    }
}

// Ledger commands

/// Creates the item for a variant/warehouse pair and records its first
/// movement.
#[derive(Debug, Clone, Validate)]
pub struct SetOpeningBalance {
    pub key: StockKey,
    #[validate(custom = "non_negative_quantity")]
    pub quantity: Decimal,
    pub allow_negative_stock: bool,
    pub expiry_date: Option<NaiveDate>,
    #[validate]
    pub details: MovementDetails,
}

impl SetOpeningBalance {
    pub fn new(key: StockKey, quantity: Decimal, details: MovementDetails) -> Self {
        Self {
            key,
            quantity,
            allow_negative_stock: false,
            expiry_date: None,
            details,
        }
    }

    pub fn allowing_negative_stock(mut self) -> Self {
        self.allow_negative_stock = true;
        self
    }

    pub fn expiring_on(mut self, date: NaiveDate) -> Self {
        self.expiry_date = Some(date);
        self
    }
}

#[derive(Debug, Clone, Validate)]
pub struct RecordPurchase {
    pub key: StockKey,
    #[validate(custom = "positive_quantity")]
    pub quantity: Decimal,
    #[validate]
    pub details: MovementDetails,
}

impl RecordPurchase {
    pub fn new(key: StockKey, quantity: Decimal, details: MovementDetails) -> Self {
        Self {
            key,
            quantity,
            details,
        }
    }
}

#[derive(Debug, Clone, Validate)]
pub struct RecordSale {
    pub key: StockKey,
    #[validate(custom = "positive_quantity")]
    pub quantity: Decimal,
    #[validate]
    pub details: MovementDetails,
}

impl RecordSale {
    pub fn new(key: StockKey, quantity: Decimal, details: MovementDetails) -> Self {
        Self {
            key,
            quantity,
            details,
        }
    }
}

/// Returns sold units to stock against an earlier sale's reference.
#[derive(Debug, Clone, Validate)]
pub struct RecordRefund {
    pub key: StockKey,
    #[validate(custom = "positive_quantity")]
    pub quantity: Decimal,
    #[validate(length(min = 1, max = 255), custom = "not_blank")]
    pub original_sale_reference: String,
    #[validate]
    pub details: MovementDetails,
}

impl RecordRefund {
    pub fn new(
        key: StockKey,
        quantity: Decimal,
        original_sale_reference: impl Into<String>,
        details: MovementDetails,
    ) -> Self {
        Self {
            key,
            quantity,
            original_sale_reference: original_sale_reference.into(),
            details,
        }
    }
}

/// Signed correction; positive adds stock, negative removes it.
#[derive(Debug, Clone, Validate)]
pub struct AdjustStock {
    pub key: StockKey,
    #[validate(custom = "non_zero_quantity")]
    pub delta: Decimal,
    #[validate]
    pub details: MovementDetails,
}

impl AdjustStock {
    pub fn new(key: StockKey, delta: Decimal, details: MovementDetails) -> Self {
        Self {
            key,
            delta,
            details,
        }
    }
}

#[derive(Debug, Clone, Validate)]
pub struct WriteOffStock {
    pub key: StockKey,
    #[validate(custom = "positive_quantity")]
    pub quantity: Decimal,
    #[validate]
    pub details: MovementDetails,
}

impl WriteOffStock {
    pub fn new(key: StockKey, quantity: Decimal, details: MovementDetails) -> Self {
        Self {
            key,
            quantity,
            details,
        }
    }
}

/// Moves stock of one variant between two warehouses of a tenant.
///
/// Without a reference in `details` the transfer gets a generated one so
/// both legs can be found together.
#[derive(Debug, Clone, Validate)]
pub struct TransferStock {
    pub tenant_id: TenantId,
    pub variant_id: VariantId,
    pub from_warehouse_id: WarehouseId,
    pub to_warehouse_id: WarehouseId,
    #[validate(custom = "positive_quantity")]
    pub quantity: Decimal,
    #[validate]
    pub details: MovementDetails,
}

impl TransferStock {
    pub fn source(&self) -> StockKey {
        StockKey::new(self.tenant_id, self.variant_id, self.from_warehouse_id)
    }

    pub fn destination(&self) -> StockKey {
        StockKey::new(self.tenant_id, self.variant_id, self.to_warehouse_id)
    }
}

/// Changes item flags. `expiry_date: Some(None)` clears the date.
#[derive(Debug, Clone, Validate)]
pub struct UpdateInventorySettings {
    pub key: StockKey,
    pub allow_negative_stock: Option<bool>,
    pub expiry_date: Option<Option<NaiveDate>>,
    pub actor: ActorId,
}

#[derive(Debug, Clone, Validate)]
pub struct DeleteInventoryItem {
    pub key: StockKey,
    pub actor: ActorId,
}

// Reservation commands

#[derive(Debug, Clone, Validate)]
pub struct CreateReservation {
    pub key: StockKey,
    #[validate(custom = "positive_quantity")]
    pub quantity: Decimal,
    pub expires_at: DateTime<Utc>,
    #[validate(length(min = 1, max = 255))]
    pub reference: Option<String>,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    pub actor: ActorId,
}

impl CreateReservation {
    pub fn new(key: StockKey, quantity: Decimal, expires_at: DateTime<Utc>, actor: ActorId) -> Self {
        Self {
            key,
            quantity,
            expires_at,
            reference: None,
            reason: None,
            actor,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, Validate)]
pub struct ModifyReservationQuantity {
    pub tenant_id: TenantId,
    pub reservation_id: ReservationId,
    #[validate(custom = "positive_quantity")]
    pub quantity: Decimal,
    pub actor: ActorId,
}

#[derive(Debug, Clone, Validate)]
pub struct ExtendReservation {
    pub tenant_id: TenantId,
    pub reservation_id: ReservationId,
    pub expires_at: DateTime<Utc>,
    pub actor: ActorId,
}

#[derive(Debug, Clone, Validate)]
pub struct CancelReservation {
    pub tenant_id: TenantId,
    pub reservation_id: ReservationId,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    pub actor: ActorId,
}

#[derive(Debug, Clone, Validate)]
pub struct UpdateReservationReason {
    pub tenant_id: TenantId,
    pub reservation_id: ReservationId,
    #[validate(length(min = 1, max = 500), custom = "not_blank")]
    pub reason: String,
    pub actor: ActorId,
}

/// Fulfils a reservation; `quantity_used` is sold, the rest goes back.
#[derive(Debug, Clone, Validate)]
pub struct UseReservation {
    pub tenant_id: TenantId,
    pub reservation_id: ReservationId,
    #[validate(custom = "positive_quantity")]
    pub quantity_used: Decimal,
    pub actor: ActorId,
}

#[derive(Debug, Clone, Validate)]
pub struct DeleteReservation {
    pub tenant_id: TenantId,
    pub reservation_id: ReservationId,
    pub actor: ActorId,
}

// Catalog commands

#[derive(Debug, Clone, Validate)]
pub struct CreateProduct {
    pub tenant_id: TenantId,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Validate)]
pub struct CreateVariant {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(custom = "non_negative_quantity")]
    pub low_stock_threshold: Decimal,
}

#[derive(Debug, Clone, Validate)]
pub struct CreateWarehouse {
    pub tenant_id: TenantId,
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}
