//! Shared types used across the inventory ledger crates.

mod types;

pub use types::{
    ActorId, InventoryItemId, MovementId, ProductId, ReservationId, TenantId, VariantId, Version,
    WarehouseId,
};
