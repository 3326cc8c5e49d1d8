//! Reservation aggregate: stock held for later fulfilment.

mod aggregate;
mod state;

pub use aggregate::{Reservation, ReservationParts};
pub use state::ReservationStatus;

use chrono::{DateTime, Utc};
use common::ReservationId;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::error::ErrorCode;

/// Errors that can occur during reservation operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReservationError {
    #[error("Reservation not found: {0}")]
    NotFound(ReservationId),

    /// The reservation already left the Active state.
    #[error("Reservation {reservation_id} is {status}; cannot {action}")]
    NotActive {
        reservation_id: ReservationId,
        status: ReservationStatus,
        action: &'static str,
    },

    #[error("Invalid quantity {quantity}: {expected}")]
    InvalidQuantity {
        quantity: Decimal,
        expected: &'static str,
    },

    #[error("Expiry {expires_at} must be in the future")]
    ExpiryNotInFuture { expires_at: DateTime<Utc> },

    #[error("Reservation {reservation_id} does not expire until {expires_at}")]
    NotYetExpired {
        reservation_id: ReservationId,
        expires_at: DateTime<Utc>,
    },

    #[error("Reservation {0} is still active and cannot be deleted")]
    StillActive(ReservationId),
}

impl ReservationError {
    /// Returns the stable failure code.
    pub fn code(&self) -> ErrorCode {
        match self {
            ReservationError::NotFound(_) => ErrorCode::ReservationNotFound,
            ReservationError::NotActive { .. } => ErrorCode::ReservationNotActive,
            ReservationError::InvalidQuantity { .. } => ErrorCode::InvalidQuantity,
            ReservationError::ExpiryNotInFuture { .. } => ErrorCode::InvalidInput,
            ReservationError::NotYetExpired { .. } | ReservationError::StillActive(_) => {
                ErrorCode::BusinessRuleViolation
            }
        }
    }
}
