//! Reservation aggregate implementation.

use chrono::{DateTime, Utc};
use common::{ActorId, ReservationId, TenantId, VariantId, Version, WarehouseId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::inventory::StockKey;

use super::{ReservationError, ReservationStatus};

/// Raw field values used to rebuild a reservation from storage.
#[derive(Debug, Clone)]
pub struct ReservationParts {
    pub id: ReservationId,
    pub key: StockKey,
    pub quantity: Decimal,
    pub expires_at: DateTime<Utc>,
    pub status: ReservationStatus,
    pub reference: Option<String>,
    pub reason: Option<String>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<ActorId>,
    pub updated_at: DateTime<Utc>,
    pub used_by: Option<ActorId>,
    pub used_at: Option<DateTime<Utc>>,
    pub used_quantity: Option<Decimal>,
    pub cancelled_by: Option<ActorId>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub deleted_by: Option<ActorId>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: Version,
}

/// Stock held against one inventory item until used, cancelled or expired.
///
/// The reservation only tracks its own lifecycle. Every operation that
/// changes the held quantity returns the amount the caller must reserve on,
/// or release from, the inventory item inside the same transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    id: ReservationId,
    key: StockKey,
    quantity: Decimal,
    expires_at: DateTime<Utc>,
    status: ReservationStatus,
    reference: Option<String>,
    reason: Option<String>,
    created_by: ActorId,
    created_at: DateTime<Utc>,
    updated_by: Option<ActorId>,
    updated_at: DateTime<Utc>,
    used_by: Option<ActorId>,
    used_at: Option<DateTime<Utc>>,
    used_quantity: Option<Decimal>,
    cancelled_by: Option<ActorId>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    deleted_by: Option<ActorId>,
    deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    version: Version,
}

impl Aggregate for Reservation {
    fn aggregate_type() -> &'static str {
        "Reservation"
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}

// Construction
impl Reservation {
    /// Creates an active reservation.
    ///
    /// The caller reserves `quantity` on the inventory item in the same
    /// transaction.
    pub fn create(
        key: StockKey,
        quantity: Decimal,
        expires_at: DateTime<Utc>,
        reference: Option<String>,
        reason: Option<String>,
        created_by: ActorId,
        now: DateTime<Utc>,
    ) -> Result<Self, ReservationError> {
        ensure_positive(quantity)?;
        ensure_future(expires_at, now)?;

        Ok(Self {
            id: ReservationId::new(),
            key,
            quantity,
            expires_at,
            status: ReservationStatus::Active,
            reference,
            reason,
            created_by,
            created_at: now,
            updated_by: None,
            updated_at: now,
            used_by: None,
            used_at: None,
            used_quantity: None,
            cancelled_by: None,
            cancelled_at: None,
            cancellation_reason: None,
            deleted_by: None,
            deleted_at: None,
            version: Version::initial(),
        })
    }

    /// Rebuilds a reservation from persisted fields.
    pub fn rehydrate(parts: ReservationParts) -> Self {
        Self {
            id: parts.id,
            key: parts.key,
            quantity: parts.quantity,
            expires_at: parts.expires_at,
            status: parts.status,
            reference: parts.reference,
            reason: parts.reason,
            created_by: parts.created_by,
            created_at: parts.created_at,
            updated_by: parts.updated_by,
            updated_at: parts.updated_at,
            used_by: parts.used_by,
            used_at: parts.used_at,
            used_quantity: parts.used_quantity,
            cancelled_by: parts.cancelled_by,
            cancelled_at: parts.cancelled_at,
            cancellation_reason: parts.cancellation_reason,
            deleted_by: parts.deleted_by,
            deleted_at: parts.deleted_at,
            version: parts.version,
        }
    }
}

// Query methods
impl Reservation {
    pub fn id(&self) -> ReservationId {
        self.id
    }

    pub fn key(&self) -> StockKey {
        self.key
    }

    pub fn tenant_id(&self) -> TenantId {
        self.key.tenant_id
    }

    pub fn variant_id(&self) -> VariantId {
        self.key.variant_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.key.warehouse_id
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn status(&self) -> ReservationStatus {
        self.status
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn created_by(&self) -> &ActorId {
        &self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_by(&self) -> Option<&ActorId> {
        self.updated_by.as_ref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn used_by(&self) -> Option<&ActorId> {
        self.used_by.as_ref()
    }

    pub fn used_at(&self) -> Option<DateTime<Utc>> {
        self.used_at
    }

    pub fn used_quantity(&self) -> Option<Decimal> {
        self.used_quantity
    }

    pub fn cancelled_by(&self) -> Option<&ActorId> {
        self.cancelled_by.as_ref()
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn deleted_by(&self) -> Option<&ActorId> {
        self.deleted_by.as_ref()
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns true if the reservation is active and past its expiry.
    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status.is_active() && self.expires_at <= now
    }
}

// Command methods
impl Reservation {
    /// Changes the held quantity and returns the signed delta.
    ///
    /// A positive delta must be reserved on the inventory item (subject to
    /// its availability check), a negative one released.
    pub fn modify_quantity(
        &mut self,
        new_quantity: Decimal,
        modified_by: ActorId,
        now: DateTime<Utc>,
    ) -> Result<Decimal, ReservationError> {
        self.ensure_active("modify quantity")?;
        ensure_positive(new_quantity)?;

        let delta = new_quantity - self.quantity;
        self.quantity = new_quantity;
        self.touch(modified_by, now);
        Ok(delta)
    }

    /// Moves the expiry to a later point in time.
    pub fn extend_expiry(
        &mut self,
        new_expiry: DateTime<Utc>,
        modified_by: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), ReservationError> {
        self.ensure_active("extend expiry")?;
        ensure_future(new_expiry, now)?;

        self.expires_at = new_expiry;
        self.touch(modified_by, now);
        Ok(())
    }

    /// Cancels the reservation and returns the quantity to release.
    pub fn cancel(
        &mut self,
        cancelled_by: ActorId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Decimal, ReservationError> {
        self.transition(ReservationStatus::Cancelled, "cancel")?;

        self.cancelled_by = Some(cancelled_by.clone());
        self.cancelled_at = Some(now);
        self.cancellation_reason = reason;
        self.touch(cancelled_by, now);
        Ok(self.quantity)
    }

    /// Replaces the free-text reason.
    pub fn update_reason(
        &mut self,
        reason: impl Into<String>,
        modified_by: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), ReservationError> {
        self.ensure_active("update reason")?;

        self.reason = Some(reason.into());
        self.touch(modified_by, now);
        Ok(())
    }

    /// Uses `quantity_used` of the held stock and returns the full quantity
    /// to release from the inventory item.
    ///
    /// Using everything fulfils the reservation; using less partially fulfils
    /// it and the remainder goes back to availability.
    pub fn fulfil(
        &mut self,
        quantity_used: Decimal,
        used_by: ActorId,
        now: DateTime<Utc>,
    ) -> Result<Decimal, ReservationError> {
        self.ensure_active("fulfil")?;
        ensure_positive(quantity_used)?;
        if quantity_used > self.quantity {
            return Err(ReservationError::InvalidQuantity {
                quantity: quantity_used,
                expected: "must not exceed the reserved quantity",
            });
        }

        let next = if quantity_used == self.quantity {
            ReservationStatus::Fulfilled
        } else {
            ReservationStatus::PartiallyFulfilled
        };
        self.transition(next, "fulfil")?;

        self.used_by = Some(used_by.clone());
        self.used_at = Some(now);
        self.used_quantity = Some(quantity_used);
        self.touch(used_by, now);
        Ok(self.quantity)
    }

    /// Expires an active reservation whose expiry has passed and returns the
    /// quantity to release.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<Decimal, ReservationError> {
        self.ensure_active("expire")?;
        if self.expires_at > now {
            return Err(ReservationError::NotYetExpired {
                reservation_id: self.id,
                expires_at: self.expires_at,
            });
        }

        self.transition(ReservationStatus::Expired, "expire")?;
        self.touch(ActorId::system(), now);
        Ok(self.quantity)
    }

    /// Marks a finished reservation deleted.
    pub fn soft_delete(
        &mut self,
        deleted_by: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), ReservationError> {
        if self.status.is_active() {
            return Err(ReservationError::StillActive(self.id));
        }

        self.deleted_by = Some(deleted_by.clone());
        self.deleted_at = Some(now);
        self.touch(deleted_by, now);
        Ok(())
    }

    fn transition(
        &mut self,
        next: ReservationStatus,
        action: &'static str,
    ) -> Result<(), ReservationError> {
        if !self.status.can_transition_to(next) {
            return Err(self.not_active(action));
        }
        self.status = next;
        Ok(())
    }

    fn ensure_active(&self, action: &'static str) -> Result<(), ReservationError> {
        if !self.status.is_active() {
            return Err(self.not_active(action));
        }
        Ok(())
    }

    fn not_active(&self, action: &'static str) -> ReservationError {
        ReservationError::NotActive {
            reservation_id: self.id,
            status: self.status,
            action,
        }
    }

    fn touch(&mut self, by: ActorId, now: DateTime<Utc>) {
        self.updated_by = Some(by);
        self.updated_at = now;
    }
}

fn ensure_positive(quantity: Decimal) -> Result<(), ReservationError> {
    if quantity <= Decimal::ZERO {
        return Err(ReservationError::InvalidQuantity {
            quantity,
            expected: "must be greater than 0",
        });
    }
    Ok(())
}

fn ensure_future(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ReservationError> {
    if expires_at <= now {
        return Err(ReservationError::ExpiryNotInFuture { expires_at });
    }
    Ok(())
}
