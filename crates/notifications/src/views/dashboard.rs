//! Live dashboard: current levels, open low-stock alerts, expiring reservations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ReservationId, TenantId};
use domain::{InventoryEvent, LowStockAlert, ReservationExpiring, StockKey};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// Latest known balances of one inventory item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockLevel {
    pub key: StockKey,
    pub total_stock: Decimal,
    pub reserved_stock: Decimal,
    pub available_stock: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// A tenant's dashboard at one point in time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardSnapshot {
    pub levels: Vec<StockLevel>,
    pub low_stock: Vec<LowStockAlert>,
    pub expiring_reservations: Vec<ReservationExpiring>,
}

#[derive(Default)]
struct DashboardState {
    levels: HashMap<StockKey, StockLevel>,
    alerts: HashMap<StockKey, LowStockAlert>,
    expiring: HashMap<ReservationId, ReservationExpiring>,
    position: ProjectionPosition,
}

/// Read model fed by the notification stream.
#[derive(Clone, Default)]
pub struct DashboardView {
    state: Arc<RwLock<DashboardState>>,
}

impl DashboardView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn level(&self, key: &StockKey) -> Option<StockLevel> {
        self.state.read().await.levels.get(key).cloned()
    }

    /// Returns the tenant's view; reservations already past `now` are left out.
    pub async fn snapshot(&self, tenant_id: TenantId, now: DateTime<Utc>) -> DashboardSnapshot {
        let state = self.state.read().await;

        let mut levels: Vec<StockLevel> = state
            .levels
            .values()
            .filter(|l| l.key.tenant_id == tenant_id)
            .cloned()
            .collect();
        levels.sort_by_key(|l| (l.key.variant_id, l.key.warehouse_id));

        let mut low_stock: Vec<LowStockAlert> = state
            .alerts
            .values()
            .filter(|a| a.tenant_id == tenant_id)
            .cloned()
            .collect();
        low_stock.sort_by(|a, b| a.available_stock.cmp(&b.available_stock));

        let mut expiring_reservations: Vec<ReservationExpiring> = state
            .expiring
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.expires_at > now)
            .cloned()
            .collect();
        expiring_reservations.sort_by_key(|r| r.expires_at);

        DashboardSnapshot {
            levels,
            low_stock,
            expiring_reservations,
        }
    }
}

#[async_trait]
impl Projection for DashboardView {
    fn name(&self) -> &'static str {
        "DashboardView"
    }

    async fn handle(&self, event: &InventoryEvent) -> Result<()> {
        let mut state = self.state.write().await;

        match event {
            InventoryEvent::StockLevelChanged(changed) => {
                let key = StockKey::new(changed.tenant_id, changed.variant_id, changed.warehouse_id);
                // A level back above the threshold closes the alert.
                if state
                    .alerts
                    .get(&key)
                    .is_some_and(|alert| changed.available_stock > alert.threshold)
                {
                    state.alerts.remove(&key);
                }
                state.levels.insert(
                    key,
                    StockLevel {
                        key,
                        total_stock: changed.total_stock,
                        reserved_stock: changed.reserved_stock,
                        available_stock: changed.available_stock,
                        updated_at: changed.occurred_at,
                    },
                );
            }
            InventoryEvent::LowStockAlert(alert) => {
                let key = StockKey::new(alert.tenant_id, alert.variant_id, alert.warehouse_id);
                state.alerts.insert(key, alert.clone());
            }
            InventoryEvent::ReservationExpiring(expiring) => {
                state
                    .expiring
                    .insert(expiring.reservation_id, expiring.clone());
            }
        }

        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = DashboardState::default();
        Ok(())
    }
}

impl ReadModel for DashboardView {
    fn name(&self) -> &'static str {
        "DashboardView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.levels.len()).unwrap_or(0)
    }
}
