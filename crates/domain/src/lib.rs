//! Domain layer for the inventory ledger.
//!
//! This crate provides the aggregates and policies of the system:
//! - `InventoryItem`, the ledger aggregate owning total and reserved stock
//! - `StockMovement`, the append-only ledger entries it emits
//! - `Reservation` with its closed status state machine
//! - refund and ledger verification policies over stored movements
//! - catalog entities and the notifications published after a commit
//!
//! Nothing here performs I/O; persistence and transactions belong to the
//! callers.

pub mod aggregate;
pub mod catalog;
pub mod error;
pub mod events;
pub mod inventory;
pub mod reservation;

pub use aggregate::{Aggregate, DomainEvent};
pub use catalog::{CatalogError, Product, Variant, Warehouse};
pub use error::{DomainError, ErrorCode, ErrorKind, ParseEnumError};
pub use events::{InventoryEvent, LowStockAlert, ReservationExpiring, StockLevelChanged};
pub use inventory::{
    EntryType, InventoryError, InventoryItem, InventoryItemParts, LedgerDiscrepancy, LedgerReport,
    LedgerVerifier, MovementContext, MovementType, RefundLedger, ReleaseOutcome, StockKey,
    StockMovement,
};
pub use reservation::{Reservation, ReservationError, ReservationParts, ReservationStatus};
