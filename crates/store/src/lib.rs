pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod repository;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryUnitOfWork};
pub use postgres::{PostgresStore, PostgresUnitOfWork};
pub use query::{
    DEFAULT_PAGE_SIZE, LowStockEntry, MAX_PAGE_SIZE, MovementQuery, Page, ReservationQuery,
};
pub use repository::{
    CatalogRepository, InventoryRepository, MovementRepository, ReservationRepository,
};
pub use store::{LedgerStream, Store, UnitOfWork};
