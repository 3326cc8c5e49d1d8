//! Application layer for the inventory ledger.
//!
//! Services here turn validated commands into one store transaction each:
//! load the aggregates, apply domain operations, write rows and movements,
//! commit, then publish notifications. Reads go straight to the store.

pub mod commands;
pub mod error;
pub mod expiry;
pub mod handler;
pub mod services;
pub mod validation;

pub use commands::{
    AdjustStock, CancelReservation, CreateProduct, CreateReservation, CreateVariant,
    CreateWarehouse, DeleteInventoryItem, DeleteReservation, ExtendReservation,
    ModifyReservationQuantity, MovementDetails, RecordPurchase, RecordRefund, RecordSale,
    SetOpeningBalance, TransferStock, UpdateInventorySettings, UpdateReservationReason,
    UseReservation, WriteOffStock,
};
pub use error::{ApplicationError, Failure, Result};
pub use expiry::{ExpirySettings, ReservationExpiryWorker, SweepReport};
pub use handler::CommandHandler;
pub use services::{
    CatalogService, InventoryService, ReservationChange, ReservationService, StockChange, Transfer,
};
