//! Post-commit notifications for the inventory ledger.
//!
//! - [`EventPublisher`] is the outbound sink services hand events to once a
//!   transaction has committed; [`BroadcastPublisher`] fans them out over a
//!   tokio broadcast channel
//! - [`Projection`] and [`ReadModel`] describe consumers of those events
//! - [`NotificationRelay`] feeds a subscription into registered projections
//! - [`DashboardView`] keeps current levels, open low-stock alerts and
//!   reservations about to expire

pub mod error;
pub mod projection;
pub mod publisher;
pub mod read_model;
pub mod relay;
pub mod views;

pub use error::{NotificationError, Result};
pub use projection::{Projection, ProjectionPosition};
pub use publisher::{BroadcastPublisher, EventPublisher};
pub use read_model::ReadModel;
pub use relay::NotificationRelay;
pub use views::{DashboardSnapshot, DashboardView, StockLevel};
