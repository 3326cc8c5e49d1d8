//! Reservation state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseEnumError;

/// The status of a reservation in its lifecycle.
///
/// State transitions:
/// ```text
///          ┌──► Fulfilled
///          ├──► PartiallyFulfilled
/// Active ──┼──► Cancelled
///          └──► Expired
/// ```
/// Every state other than `Active` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReservationStatus {
    /// Stock is held.
    #[default]
    Active,

    /// The full quantity was used.
    Fulfilled,

    /// Part of the quantity was used; the rest went back to availability.
    PartiallyFulfilled,

    /// Released on request.
    Cancelled,

    /// Released by the expiry sweep.
    Expired,
}

impl ReservationStatus {
    pub const ALL: [ReservationStatus; 5] = [
        ReservationStatus::Active,
        ReservationStatus::Fulfilled,
        ReservationStatus::PartiallyFulfilled,
        ReservationStatus::Cancelled,
        ReservationStatus::Expired,
    ];

    /// Returns true if `next` is reachable from this state.
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        matches!(
            (self, next),
            (
                ReservationStatus::Active,
                ReservationStatus::Fulfilled
                    | ReservationStatus::PartiallyFulfilled
                    | ReservationStatus::Cancelled
                    | ReservationStatus::Expired
            )
        )
    }

    /// Returns true if the reservation may still be modified.
    pub fn is_active(&self) -> bool {
        matches!(self, ReservationStatus::Active)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "Active",
            ReservationStatus::Fulfilled => "Fulfilled",
            ReservationStatus::PartiallyFulfilled => "PartiallyFulfilled",
            ReservationStatus::Cancelled => "Cancelled",
            ReservationStatus::Expired => "Expired",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReservationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("reservation status", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_active() {
        assert_eq!(ReservationStatus::default(), ReservationStatus::Active);
    }

    #[test]
    fn active_reaches_every_terminal_state() {
        for next in ReservationStatus::ALL {
            let expected = next != ReservationStatus::Active;
            assert_eq!(ReservationStatus::Active.can_transition_to(next), expected);
        }
    }

    #[test]
    fn terminal_states_have_no_transitions() {
        for from in ReservationStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for next in ReservationStatus::ALL {
                assert!(!from.can_transition_to(next), "{from} -> {next}");
            }
        }
    }

    #[test]
    fn parse_round_trip() {
        for status in ReservationStatus::ALL {
            assert_eq!(status.to_string().parse::<ReservationStatus>().unwrap(), status);
        }
        assert!("Pending".parse::<ReservationStatus>().is_err());
    }
}
