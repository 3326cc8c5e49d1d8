use std::sync::Arc;

use chrono::Utc;
use common::{TenantId, VariantId, WarehouseId};
use domain::{
    Aggregate, InventoryError, InventoryItem, LedgerReport, LedgerVerifier, RefundLedger, StockKey,
    StockMovement,
};
use futures_util::TryStreamExt;
use notifications::EventPublisher;
use rust_decimal::Decimal;
use store::{
    InventoryRepository, LowStockEntry, MovementQuery, MovementRepository, Page, Store,
    StoreError,
};
use uuid::Uuid;

use super::{
    Notifier, StockChange, load_item, low_stock_threshold, require_variant, require_warehouse,
    save_item,
};
use crate::commands::{
    AdjustStock, DeleteInventoryItem, RecordPurchase, RecordRefund, RecordSale, SetOpeningBalance,
    TransferStock, UpdateInventorySettings, WriteOffStock,
};
use crate::error::{ApplicationError, Result};
use crate::handler::CommandHandler;
use crate::validation::validate;

/// An item inserted by a concurrent opening balance surfaces as a unique-key
/// violation on insert; report it like the sequential case.
fn opening_balance_race(key: &StockKey, err: StoreError) -> ApplicationError {
    match err {
        StoreError::Duplicate { entity, .. } if entity == InventoryItem::aggregate_type() => {
            InventoryError::OpeningBalanceExists {
                variant_id: key.variant_id,
                warehouse_id: key.warehouse_id,
            }
            .into()
        }
        other => other.into(),
    }
}

/// Both legs of a committed transfer.
#[derive(Debug, Clone)]
pub struct Transfer {
    pub reference: String,
    pub source: StockChange,
    pub destination: StockChange,
}

/// Ledger commands and stock queries.
///
/// Every command loads the item, applies one domain operation, writes the
/// item and its movements, and commits; notifications go out afterwards.
pub struct InventoryService<S: Store> {
    handler: CommandHandler<S>,
    notifier: Notifier,
}

impl<S: Store> InventoryService<S> {
    pub fn new(store: S, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            handler: CommandHandler::new(store),
            notifier: Notifier::new(publisher),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S> {
        &self.handler
    }

    /// Records the first movement of a variant/warehouse pair, creating the
    /// item. A second opening balance is rejected.
    #[tracing::instrument(skip(self))]
    pub async fn set_opening_balance(&self, cmd: SetOpeningBalance) -> Result<StockChange> {
        validate(&cmd)?;
        let now = Utc::now();

        let change = self
            .handler
            .execute("set_opening_balance", move |uow| {
                Box::pin(async move {
                    let key = cmd.key;
                    let variant = require_variant(uow, key.tenant_id, key.variant_id).await?;
                    require_warehouse(uow, key.tenant_id, key.warehouse_id).await?;

                    let existing = uow.get_by_variant_and_warehouse(&key).await?;
                    let is_new = existing.is_none();
                    let mut item = existing.unwrap_or_else(|| {
                        InventoryItem::new(key, cmd.allow_negative_stock, cmd.expiry_date, now)
                    });

                    let context = cmd.details.context(now);
                    let movement = item.set_opening_balance(cmd.quantity, &context)?;
                    let version = if is_new {
                        uow.add_item(&item)
                            .await
                            .map_err(|err| opening_balance_race(&key, err))?
                    } else {
                        uow.update_item(&item).await?
                    };
                    item.set_version(version);
                    uow.add_movement(&movement).await?;

                    Ok(StockChange::new(
                        item,
                        vec![movement],
                        Some(variant.low_stock_threshold),
                    ))
                })
            })
            .await?;

        self.notifier.stock_changed(&change).await;
        Ok(change)
    }

    #[tracing::instrument(skip(self))]
    pub async fn record_purchase(&self, cmd: RecordPurchase) -> Result<StockChange> {
        validate(&cmd)?;
        let context = cmd.details.context(Utc::now());
        let quantity = cmd.quantity;
        self.apply("record_purchase", cmd.key, move |item| {
            item.record_purchase(quantity, &context)
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn record_sale(&self, cmd: RecordSale) -> Result<StockChange> {
        validate(&cmd)?;
        let context = cmd.details.context(Utc::now());
        let quantity = cmd.quantity;
        self.apply("record_sale", cmd.key, move |item| {
            item.record_sale(quantity, &context)
        })
        .await
    }

    /// Returns stock against an earlier sale. The sold and refunded totals
    /// for the reference are recomputed inside the transaction.
    #[tracing::instrument(skip(self))]
    pub async fn record_refund(&self, cmd: RecordRefund) -> Result<StockChange> {
        validate(&cmd)?;
        let now = Utc::now();

        let change = self
            .handler
            .execute("record_refund", move |uow| {
                Box::pin(async move {
                    let key = cmd.key;
                    let mut item = load_item(uow, &key).await?;

                    let reference = cmd.original_sale_reference.as_str();
                    let related = uow
                        .get_movements_by_reference(key.tenant_id, reference)
                        .await?;
                    RefundLedger::for_variant(reference, key.variant_id, &related)
                        .ensure_refundable(cmd.quantity)?;

                    let movement =
                        item.record_refund(cmd.quantity, reference, &cmd.details.context(now))?;
                    save_item(uow, &mut item).await?;
                    uow.add_movement(&movement).await?;

                    let threshold = low_stock_threshold(uow, &key).await?;
                    Ok(StockChange::new(item, vec![movement], threshold))
                })
            })
            .await?;

        self.notifier.stock_changed(&change).await;
        Ok(change)
    }

    #[tracing::instrument(skip(self))]
    pub async fn adjust_stock(&self, cmd: AdjustStock) -> Result<StockChange> {
        validate(&cmd)?;
        let context = cmd.details.context(Utc::now());
        let delta = cmd.delta;
        self.apply("adjust_stock", cmd.key, move |item| {
            item.record_adjustment(delta, &context)
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn write_off_stock(&self, cmd: WriteOffStock) -> Result<StockChange> {
        validate(&cmd)?;
        let context = cmd.details.context(Utc::now());
        let quantity = cmd.quantity;
        self.apply("write_off_stock", cmd.key, move |item| {
            item.record_write_off(quantity, &context)
        })
        .await
    }

    /// Moves stock between warehouses as one paired outbound/inbound entry.
    #[tracing::instrument(skip(self))]
    pub async fn transfer_stock(&self, cmd: TransferStock) -> Result<Transfer> {
        validate(&cmd)?;
        let now = Utc::now();
        let reference = cmd
            .details
            .reference
            .clone()
            .unwrap_or_else(|| format!("TRF-{}", Uuid::new_v4()));
        let context = cmd.details.context(now).with_reference(reference.clone());

        let transfer = self
            .handler
            .execute("transfer_stock", move |uow| {
                Box::pin(async move {
                    let source_key = cmd.source();
                    let destination_key = cmd.destination();

                    // Lock both rows in warehouse order.
                    let (mut source, mut destination) =
                        if source_key.warehouse_id <= destination_key.warehouse_id {
                            let source = load_item(uow, &source_key).await?;
                            (source, load_item(uow, &destination_key).await?)
                        } else {
                            let destination = load_item(uow, &destination_key).await?;
                            (load_item(uow, &source_key).await?, destination)
                        };

                    let (outbound, inbound) = InventoryItem::transfer(
                        &mut source,
                        &mut destination,
                        cmd.quantity,
                        &context,
                    )?;

                    save_item(uow, &mut source).await?;
                    save_item(uow, &mut destination).await?;
                    uow.add_movement(&outbound).await?;
                    uow.add_movement(&inbound).await?;

                    let threshold = low_stock_threshold(uow, &source_key).await?;
                    Ok(Transfer {
                        reference,
                        source: StockChange::new(source, vec![outbound], threshold),
                        destination: StockChange::new(destination, vec![inbound], threshold),
                    })
                })
            })
            .await?;

        self.notifier.stock_changed(&transfer.source).await;
        self.notifier.stock_changed(&transfer.destination).await;
        Ok(transfer)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_settings(&self, cmd: UpdateInventorySettings) -> Result<InventoryItem> {
        validate(&cmd)?;
        let now = Utc::now();

        self.handler
            .execute("update_inventory_settings", move |uow| {
                Box::pin(async move {
                    let mut item = load_item(uow, &cmd.key).await?;
                    item.update_settings(cmd.allow_negative_stock, cmd.expiry_date, now)?;
                    save_item(uow, &mut item).await?;
                    Ok(item)
                })
            })
            .await
    }

    /// Soft-deletes an item. Its movements are kept.
    #[tracing::instrument(skip(self))]
    pub async fn delete_item(&self, cmd: DeleteInventoryItem) -> Result<InventoryItem> {
        validate(&cmd)?;
        let now = Utc::now();

        self.handler
            .execute("delete_inventory_item", move |uow| {
                Box::pin(async move {
                    let mut item = load_item(uow, &cmd.key).await?;
                    item.soft_delete(cmd.actor, now)?;
                    save_item(uow, &mut item).await?;
                    Ok(item)
                })
            })
            .await
    }

    async fn apply<F>(&self, command: &'static str, key: StockKey, op: F) -> Result<StockChange>
    where
        F: FnOnce(&mut InventoryItem) -> std::result::Result<StockMovement, InventoryError>
            + Send
            + 'static,
    {
        let change = self
            .handler
            .execute(command, move |uow| {
                Box::pin(async move {
                    let mut item = load_item(uow, &key).await?;
                    let movement = op(&mut item)?;
                    save_item(uow, &mut item).await?;
                    uow.add_movement(&movement).await?;

                    let threshold = low_stock_threshold(uow, &key).await?;
                    Ok(StockChange::new(item, vec![movement], threshold))
                })
            })
            .await?;

        self.notifier.stock_changed(&change).await;
        Ok(change)
    }

    // Queries

    /// Returns a live item or `INVENTORY_NOT_FOUND`.
    pub async fn get_inventory(&self, key: &StockKey) -> Result<InventoryItem> {
        self.handler
            .store()
            .find_inventory(key)
            .await?
            .ok_or_else(|| {
                InventoryError::NotFound {
                    variant_id: key.variant_id,
                    warehouse_id: key.warehouse_id,
                }
                .into()
            })
    }

    pub async fn movement_history(&self, query: MovementQuery) -> Result<Page<StockMovement>> {
        Ok(self.handler.store().movement_history(query).await?)
    }

    pub async fn movements_by_reference(
        &self,
        tenant_id: TenantId,
        reference: &str,
    ) -> Result<Vec<StockMovement>> {
        Ok(self
            .handler
            .store()
            .movements_by_reference(tenant_id, reference)
            .await?)
    }

    /// Sold, refunded and remaining quantities for a sale reference,
    /// optionally narrowed to one variant.
    pub async fn refundable_quantity(
        &self,
        tenant_id: TenantId,
        reference: &str,
        variant_id: Option<VariantId>,
    ) -> Result<RefundLedger> {
        let related = self.movements_by_reference(tenant_id, reference).await?;
        let ledger = match variant_id {
            Some(variant_id) => RefundLedger::for_variant(reference, variant_id, &related),
            None => RefundLedger::from_movements(reference, &related),
        };
        ledger.ensure_refundable(Decimal::ZERO)?;
        Ok(ledger)
    }

    pub async fn low_stock(
        &self,
        tenant_id: TenantId,
        warehouse_id: Option<WarehouseId>,
    ) -> Result<Vec<LowStockEntry>> {
        Ok(self
            .handler
            .store()
            .low_stock_items(tenant_id, warehouse_id)
            .await?)
    }

    /// Replays an item's ledger and checks it against the stored total.
    #[tracing::instrument(skip(self))]
    pub async fn verify_ledger(&self, key: &StockKey) -> Result<LedgerReport> {
        let item = self.get_inventory(key).await?;
        let mut ledger = self.handler.store().stream_ledger(item.id()).await?;

        let mut verifier = LedgerVerifier::new();
        while let Some(movement) = ledger.try_next().await? {
            verifier.push(&movement);
        }

        let report = verifier.finish(item.total_stock());
        if !report.is_consistent() {
            metrics::counter!("inventory_ledger_discrepancies").increment(1);
            tracing::error!(
                item = %key,
                discrepancies = report.discrepancies.len(),
                "ledger does not match recorded total"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{TenantId, VariantId, WarehouseId};
    use domain::ErrorCode;

    fn key() -> StockKey {
        StockKey::new(TenantId::new(), VariantId::new(), WarehouseId::new())
    }

    #[test]
    fn losing_an_opening_balance_race_is_a_business_rejection() {
        let key = key();
        let err = opening_balance_race(
            &key,
            StoreError::Duplicate {
                entity: InventoryItem::aggregate_type(),
                key: key.to_string(),
            },
        );
        assert_eq!(err.code(), Some(ErrorCode::OpeningBalanceExists));
    }

    #[test]
    fn other_store_failures_pass_through() {
        let key = key();
        let err = opening_balance_race(
            &key,
            StoreError::Duplicate {
                entity: "Variant",
                key: "sku".into(),
            },
        );
        assert_eq!(err.code(), None);

        let err = opening_balance_race(&key, StoreError::Unavailable("down".into()));
        assert!(matches!(err, ApplicationError::Store(StoreError::Unavailable(_))));
    }
}
