use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{ReservationId, TenantId};
use domain::{Aggregate, MovementContext, Reservation, ReservationError};
use notifications::EventPublisher;
use rust_decimal::Decimal;
use store::{MovementRepository, Page, ReservationQuery, ReservationRepository, Store};

use super::{
    Notifier, StockChange, load_item, load_reservation, low_stock_threshold, save_item,
    save_reservation,
};
use crate::commands::{
    CancelReservation, CreateReservation, DeleteReservation, ExtendReservation,
    ModifyReservationQuantity, UpdateReservationReason, UseReservation,
};
use crate::error::Result;
use crate::handler::CommandHandler;
use crate::validation::validate;

/// A reservation after a committed command, with the item it holds stock on.
#[derive(Debug, Clone)]
pub struct ReservationChange {
    pub reservation: Reservation,
    pub stock: StockChange,
}

/// Reservation lifecycle: every status change and the matching reserve or
/// release on the inventory item commit together.
pub struct ReservationService<S: Store> {
    handler: CommandHandler<S>,
    notifier: Notifier,
}

impl<S: Store> ReservationService<S> {
    pub fn new(store: S, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            handler: CommandHandler::new(store),
            notifier: Notifier::new(publisher),
        }
    }

    pub fn store(&self) -> &S {
        self.handler.store()
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_reservation(&self, cmd: CreateReservation) -> Result<ReservationChange> {
        validate(&cmd)?;
        let now = Utc::now();

        let change = self
            .handler
            .execute("create_reservation", move |uow| {
                Box::pin(async move {
                    let mut item = load_item(uow, &cmd.key).await?;
                    let mut reservation = Reservation::create(
                        cmd.key,
                        cmd.quantity,
                        cmd.expires_at,
                        cmd.reference,
                        cmd.reason,
                        cmd.actor,
                        now,
                    )?;

                    item.reserve_stock(cmd.quantity, reservation.id(), now)?;
                    save_item(uow, &mut item).await?;
                    let version = uow.add_reservation(&reservation).await?;
                    reservation.set_version(version);

                    let threshold = low_stock_threshold(uow, &cmd.key).await?;
                    Ok(ReservationChange {
                        reservation,
                        stock: StockChange::new(item, Vec::new(), threshold),
                    })
                })
            })
            .await?;

        tracing::info!(reservation_id = %change.reservation.id(), "reservation created");
        self.notifier.stock_changed(&change.stock).await;
        Ok(change)
    }

    /// Changes the held quantity; the difference is reserved or released.
    #[tracing::instrument(skip(self))]
    pub async fn modify_quantity(
        &self,
        cmd: ModifyReservationQuantity,
    ) -> Result<ReservationChange> {
        validate(&cmd)?;
        let now = Utc::now();

        let change = self
            .handler
            .execute("modify_reservation_quantity", move |uow| {
                Box::pin(async move {
                    let mut reservation =
                        load_reservation(uow, cmd.tenant_id, cmd.reservation_id).await?;
                    let key = reservation.key();
                    let mut item = load_item(uow, &key).await?;

                    let delta = reservation.modify_quantity(cmd.quantity, cmd.actor, now)?;
                    if delta > Decimal::ZERO {
                        item.reserve_stock(delta, reservation.id(), now)?;
                    } else if delta < Decimal::ZERO {
                        item.release_reserved_stock(-delta, reservation.id(), now)?;
                    }

                    save_item(uow, &mut item).await?;
                    save_reservation(uow, &mut reservation).await?;

                    let threshold = low_stock_threshold(uow, &key).await?;
                    Ok(ReservationChange {
                        reservation,
                        stock: StockChange::new(item, Vec::new(), threshold),
                    })
                })
            })
            .await?;

        self.notifier.stock_changed(&change.stock).await;
        Ok(change)
    }

    #[tracing::instrument(skip(self))]
    pub async fn extend_expiry(&self, cmd: ExtendReservation) -> Result<Reservation> {
        validate(&cmd)?;
        let now = Utc::now();

        self.handler
            .execute("extend_reservation", move |uow| {
                Box::pin(async move {
                    let mut reservation =
                        load_reservation(uow, cmd.tenant_id, cmd.reservation_id).await?;
                    reservation.extend_expiry(cmd.expires_at, cmd.actor, now)?;
                    save_reservation(uow, &mut reservation).await?;
                    Ok(reservation)
                })
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, cmd: CancelReservation) -> Result<ReservationChange> {
        validate(&cmd)?;
        let now = Utc::now();

        let change = self
            .handler
            .execute("cancel_reservation", move |uow| {
                Box::pin(async move {
                    let mut reservation =
                        load_reservation(uow, cmd.tenant_id, cmd.reservation_id).await?;
                    let key = reservation.key();
                    let mut item = load_item(uow, &key).await?;

                    let quantity = reservation.cancel(cmd.actor, cmd.reason, now)?;
                    item.release_reserved_stock(quantity, reservation.id(), now)?;

                    save_item(uow, &mut item).await?;
                    save_reservation(uow, &mut reservation).await?;

                    let threshold = low_stock_threshold(uow, &key).await?;
                    Ok(ReservationChange {
                        reservation,
                        stock: StockChange::new(item, Vec::new(), threshold),
                    })
                })
            })
            .await?;

        self.notifier.stock_changed(&change.stock).await;
        Ok(change)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_reason(&self, cmd: UpdateReservationReason) -> Result<Reservation> {
        validate(&cmd)?;
        let now = Utc::now();

        self.handler
            .execute("update_reservation_reason", move |uow| {
                Box::pin(async move {
                    let mut reservation =
                        load_reservation(uow, cmd.tenant_id, cmd.reservation_id).await?;
                    reservation.update_reason(cmd.reason, cmd.actor, now)?;
                    save_reservation(uow, &mut reservation).await?;
                    Ok(reservation)
                })
            })
            .await
    }

    /// Fulfils a reservation: the whole held quantity is released and the
    /// used part is recorded as a sale.
    ///
    /// The sale carries the reservation's reference (or its id when it has
    /// none) so it can later be refunded.
    #[tracing::instrument(skip(self))]
    pub async fn use_reservation(&self, cmd: UseReservation) -> Result<ReservationChange> {
        validate(&cmd)?;
        let now = Utc::now();

        let change = self
            .handler
            .execute("use_reservation", move |uow| {
                Box::pin(async move {
                    let mut reservation =
                        load_reservation(uow, cmd.tenant_id, cmd.reservation_id).await?;
                    let key = reservation.key();
                    let mut item = load_item(uow, &key).await?;

                    let held = reservation.fulfil(cmd.quantity_used, cmd.actor.clone(), now)?;
                    item.release_reserved_stock(held, reservation.id(), now)?;

                    let reference = reservation
                        .reference()
                        .map(str::to_string)
                        .unwrap_or_else(|| reservation.id().to_string());
                    let context = MovementContext::new("reservation fulfilled", cmd.actor)
                        .with_reference(reference)
                        .with_metadata(HashMap::from([(
                            "reservation_id".to_string(),
                            reservation.id().to_string(),
                        )]))
                        .at(now);
                    let sale = item.record_sale(cmd.quantity_used, &context)?;

                    save_item(uow, &mut item).await?;
                    save_reservation(uow, &mut reservation).await?;
                    uow.add_movement(&sale).await?;

                    let threshold = low_stock_threshold(uow, &key).await?;
                    Ok(ReservationChange {
                        reservation,
                        stock: StockChange::new(item, vec![sale], threshold),
                    })
                })
            })
            .await?;

        self.notifier.stock_changed(&change.stock).await;
        Ok(change)
    }

    /// Soft-deletes a reservation that is no longer active.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, cmd: DeleteReservation) -> Result<Reservation> {
        validate(&cmd)?;
        let now = Utc::now();

        self.handler
            .execute("delete_reservation", move |uow| {
                Box::pin(async move {
                    let mut reservation =
                        load_reservation(uow, cmd.tenant_id, cmd.reservation_id).await?;
                    reservation.soft_delete(cmd.actor, now)?;
                    save_reservation(uow, &mut reservation).await?;
                    Ok(reservation)
                })
            })
            .await
    }

    /// Expires one reservation whose expiry has passed and releases its
    /// stock. Used by the expiry worker.
    #[tracing::instrument(skip(self))]
    pub async fn expire(
        &self,
        tenant_id: TenantId,
        reservation_id: ReservationId,
        now: DateTime<Utc>,
    ) -> Result<ReservationChange> {
        let change = self
            .handler
            .execute("expire_reservation", move |uow| {
                Box::pin(async move {
                    let mut reservation = load_reservation(uow, tenant_id, reservation_id).await?;
                    let key = reservation.key();
                    let mut item = load_item(uow, &key).await?;

                    let quantity = reservation.expire(now)?;
                    item.release_reserved_stock(quantity, reservation.id(), now)?;

                    save_item(uow, &mut item).await?;
                    save_reservation(uow, &mut reservation).await?;

                    let threshold = low_stock_threshold(uow, &key).await?;
                    Ok(ReservationChange {
                        reservation,
                        stock: StockChange::new(item, Vec::new(), threshold),
                    })
                })
            })
            .await?;

        metrics::counter!("reservations_expired").increment(1);
        tracing::info!(
            %reservation_id,
            quantity = %change.reservation.quantity(),
            "reservation expired"
        );
        self.notifier.stock_changed(&change.stock).await;
        Ok(change)
    }

    /// Announces that a reservation is about to lapse.
    pub async fn warn_expiring(&self, reservation: &Reservation) {
        self.notifier.reservation_expiring(reservation).await;
    }

    // Queries

    pub async fn get_reservation(
        &self,
        tenant_id: TenantId,
        reservation_id: ReservationId,
    ) -> Result<Reservation> {
        self.handler
            .store()
            .find_reservation(tenant_id, reservation_id)
            .await?
            .ok_or_else(|| ReservationError::NotFound(reservation_id).into())
    }

    pub async fn list_reservations(&self, query: ReservationQuery) -> Result<Page<Reservation>> {
        Ok(self.handler.store().list_reservations(query).await?)
    }
}
