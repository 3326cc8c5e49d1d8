//! Stock movements: the immutable ledger entries.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::{ActorId, InventoryItemId, MovementId, TenantId, VariantId, WarehouseId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ParseEnumError;

use super::InventoryItem;

/// What caused a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementType {
    OpeningBalance,
    Purchase,
    Sale,
    Refund,
    Adjustment,
    WriteOff,
    Transfer,
}

impl MovementType {
    pub const ALL: [MovementType; 7] = [
        MovementType::OpeningBalance,
        MovementType::Purchase,
        MovementType::Sale,
        MovementType::Refund,
        MovementType::Adjustment,
        MovementType::WriteOff,
        MovementType::Transfer,
    ];

    /// Returns the type name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::OpeningBalance => "OpeningBalance",
            MovementType::Purchase => "Purchase",
            MovementType::Sale => "Sale",
            MovementType::Refund => "Refund",
            MovementType::Adjustment => "Adjustment",
            MovementType::WriteOff => "WriteOff",
            MovementType::Transfer => "Transfer",
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MovementType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("movement type", s))
    }
}

/// Double-entry side of a movement: debits increase stock, credits decrease it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    Debit,
    Credit,
}

impl EntryType {
    /// Derives the entry side from a signed quantity.
    pub fn for_quantity(quantity: Decimal) -> Self {
        if quantity.is_sign_negative() && !quantity.is_zero() {
            EntryType::Credit
        } else {
            EntryType::Debit
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Debit => "Debit",
            EntryType::Credit => "Credit",
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Debit" => Ok(EntryType::Debit),
            "Credit" => Ok(EntryType::Credit),
            other => Err(ParseEnumError::new("entry type", other)),
        }
    }
}

/// Who, why and when for a stock mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementContext {
    pub reason: String,
    pub actor: ActorId,
    pub reference: Option<String>,
    pub metadata: HashMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl MovementContext {
    /// Creates a context timestamped now.
    pub fn new(reason: impl Into<String>, actor: ActorId) -> Self {
        Self {
            reason: reason.into(),
            actor,
            reference: None,
            metadata: HashMap::new(),
            occurred_at: Utc::now(),
        }
    }

    /// Sets the correlation reference.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Sets an optional correlation reference.
    pub fn with_optional_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }

    /// Replaces the metadata bag.
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Overrides the timestamp.
    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}

/// An immutable, append-only ledger entry.
///
/// `quantity` is signed: positive for increases, negative for decreases.
/// `running_balance` is the item's total stock right after this entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub tenant_id: TenantId,
    pub inventory_item_id: InventoryItemId,
    pub variant_id: VariantId,
    pub warehouse_id: WarehouseId,
    pub movement_type: MovementType,
    pub entry_type: EntryType,
    pub quantity: Decimal,
    pub running_balance: Decimal,
    pub reason: String,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
    pub reference: Option<String>,
    pub metadata: HashMap<String, String>,
    pub paired_movement_id: Option<MovementId>,
}

impl StockMovement {
    /// Records an entry against an item whose balance already reflects it.
    pub(crate) fn record(
        item: &InventoryItem,
        movement_type: MovementType,
        quantity: Decimal,
        context: &MovementContext,
    ) -> Self {
        let key = item.key();
        Self {
            id: MovementId::new(),
            tenant_id: key.tenant_id,
            inventory_item_id: item.id(),
            variant_id: key.variant_id,
            warehouse_id: key.warehouse_id,
            movement_type,
            entry_type: EntryType::for_quantity(quantity),
            quantity,
            running_balance: item.total_stock(),
            reason: context.reason.clone(),
            actor: context.actor.clone(),
            occurred_at: context.occurred_at,
            reference: context.reference.clone(),
            metadata: context.metadata.clone(),
            paired_movement_id: None,
        }
    }

    /// Returns true if this entry increased stock.
    pub fn is_increase(&self) -> bool {
        self.entry_type == EntryType::Debit
    }
}
