use domain::{CatalogError, DomainError, ErrorCode, ErrorKind, InventoryError, ReservationError};
use serde::Serialize;
use store::StoreError;
use thiserror::Error;

/// A rejected command: a stable code plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub code: ErrorCode,
    pub message: String,
}

impl Failure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Errors returned by the application services.
///
/// `Rejected` carries a business or input failure and always means the
/// transaction was rolled back. `Store` is an infrastructure fault and is
/// never folded into a business code.
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("{0}")]
    Rejected(Failure),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApplicationError {
    pub fn rejected(code: ErrorCode, message: impl Into<String>) -> Self {
        ApplicationError::Rejected(Failure::new(code, message))
    }

    /// Returns the failure code, if this is a rejection.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ApplicationError::Rejected(failure) => Some(failure.code),
            ApplicationError::Store(_) => None,
        }
    }

    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(
            self,
            ApplicationError::Store(StoreError::ConcurrencyConflict { .. })
        )
    }
}

impl From<DomainError> for ApplicationError {
    fn from(error: DomainError) -> Self {
        ApplicationError::Rejected(Failure::new(error.code(), error.to_string()))
    }
}

impl From<InventoryError> for ApplicationError {
    fn from(error: InventoryError) -> Self {
        DomainError::from(error).into()
    }
}

impl From<ReservationError> for ApplicationError {
    fn from(error: ReservationError) -> Self {
        DomainError::from(error).into()
    }
}

impl From<CatalogError> for ApplicationError {
    fn from(error: CatalogError) -> Self {
        DomainError::from(error).into()
    }
}

pub type Result<T> = std::result::Result<T, ApplicationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ReservationId, VariantId, WarehouseId};
    use domain::ReservationStatus;

    #[test]
    fn domain_errors_become_rejections_with_their_code() {
        let error: ApplicationError = InventoryError::NotFound {
            variant_id: VariantId::new(),
            warehouse_id: WarehouseId::new(),
        }
        .into();
        assert_eq!(error.code(), Some(ErrorCode::InventoryNotFound));

        let error: ApplicationError = ReservationError::NotActive {
            reservation_id: ReservationId::new(),
            status: ReservationStatus::Cancelled,
            action: "cancel",
        }
        .into();
        assert_eq!(error.code(), Some(ErrorCode::ReservationNotActive));
        assert!(error.to_string().starts_with("RESERVATION_NOT_ACTIVE: "));
    }

    #[test]
    fn store_errors_carry_no_code() {
        let error: ApplicationError = StoreError::Unavailable("down".into()).into();
        assert_eq!(error.code(), None);
        assert!(!error.is_concurrency_conflict());
    }
}
