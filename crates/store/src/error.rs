use common::Version;
use domain::ParseEnumError;
use thiserror::Error;

/// Errors that can occur when interacting with the store.
///
/// These are infrastructure faults, never business rule failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The row changed since it was read.
    #[error(
        "Concurrency conflict for {aggregate_type} {id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_type: &'static str,
        id: String,
        expected: Version,
        actual: Version,
    },

    /// A unique key is already taken.
    #[error("Duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },

    /// An update targeted a row that does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be decoded.
    #[error("Corrupt row: {0}")]
    Corrupt(#[from] ParseEnumError),

    /// The backend refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
