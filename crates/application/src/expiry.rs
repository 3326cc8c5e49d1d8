//! Background sweep that expires lapsed reservations.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::ReservationId;
use store::Store;
use tokio::sync::{Mutex, watch};

use crate::error::{ApplicationError, Result};
use crate::services::ReservationService;

/// Worker timing and batch sizes.
#[derive(Debug, Clone)]
pub struct ExpirySettings {
    /// Time between sweeps.
    pub interval: Duration,
    /// How far ahead a reservation counts as expiring soon.
    pub warning_window: chrono::Duration,
    /// Maximum reservations handled per sweep.
    pub batch_size: usize,
}

impl Default for ExpirySettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            warning_window: chrono::Duration::minutes(15),
            batch_size: 100,
        }
    }
}

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub skipped: usize,
    pub failed: usize,
    pub warned: usize,
}

/// Expires due reservations, each in its own transaction, and announces
/// the ones about to lapse.
///
/// A reservation that stopped being Active between the scan and its
/// transaction is skipped; a store failure on one reservation does not
/// stop the sweep.
pub struct ReservationExpiryWorker<S: Store> {
    service: Arc<ReservationService<S>>,
    settings: ExpirySettings,
    warned: Mutex<HashSet<ReservationId>>,
}

impl<S: Store> ReservationExpiryWorker<S> {
    pub fn new(service: Arc<ReservationService<S>>, settings: ExpirySettings) -> Self {
        Self {
            service,
            settings,
            warned: Mutex::new(HashSet::new()),
        }
    }

    /// Sweeps every `interval` until `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(interval = ?self.settings.interval, "reservation expiry worker started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep(Utc::now()).await {
                        Ok(report) if report != SweepReport::default() => {
                            tracing::info!(?report, "expiry sweep finished");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "expiry sweep failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("reservation expiry worker stopped");
    }

    /// Runs one sweep as of `now`.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let store = self.service.store();
        let mut report = SweepReport::default();

        let due = store.due_for_expiry(now, self.settings.batch_size).await?;
        for (tenant_id, reservation_id) in due {
            match self.service.expire(tenant_id, reservation_id, now).await {
                Ok(_) => report.expired += 1,
                Err(ApplicationError::Rejected(failure)) => {
                    tracing::debug!(%reservation_id, code = %failure.code, "skipped expiry");
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(%reservation_id, error = %e, "failed to expire reservation");
                    report.failed += 1;
                }
            }
        }

        let expiring = store
            .expiring_reservations(now, now + self.settings.warning_window, self.settings.batch_size)
            .await?;
        let mut warned = self.warned.lock().await;
        warned.retain(|id| expiring.iter().any(|r| r.id() == *id));
        for reservation in &expiring {
            if warned.insert(reservation.id()) {
                self.service.warn_expiring(reservation).await;
                report.warned += 1;
            }
        }

        Ok(report)
    }
}
