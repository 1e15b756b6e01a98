use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pourline_core::DrinkId;
use pourline_inventory::{Drink, PourTransaction};
use pourline_sales::Order;

use crate::envelope::{Envelope, EnvelopeKind};

/// Current stock of one drink as the server sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub drink_id: DrinkId,
    pub name: String,
    pub inventory: i64,
    pub sales: i64,
}

impl From<&Drink> for StockLevel {
    fn from(drink: &Drink) -> Self {
        Self {
            drink_id: drink.id,
            name: drink.name.clone(),
            inventory: drink.inventory,
            sales: drink.sales,
        }
    }
}

/// Everything the server announces to connected displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeEvent {
    InventoryUpdate { drinks: Vec<StockLevel> },
    TransactionUpdate { order: Order },
    PourUpdate { transactions: Vec<PourTransaction> },
}

impl RealtimeEvent {
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Self::InventoryUpdate { .. } => EnvelopeKind::InventoryUpdate,
            Self::TransactionUpdate { .. } => EnvelopeKind::TransactionUpdate,
            Self::PourUpdate { .. } => EnvelopeKind::PourUpdate,
        }
    }

    /// Whether the connection that caused the event should not receive it.
    ///
    /// Stock changes reach everyone, the submitter included, so every display
    /// converges on server truth.
    pub fn skips_originator(&self) -> bool {
        !matches!(self, Self::InventoryUpdate { .. })
    }

    pub fn to_envelope(&self, at: DateTime<Utc>) -> Result<Envelope, serde_json::Error> {
        let data = match self {
            Self::InventoryUpdate { drinks } => serde_json::json!({ "drinks": drinks }),
            Self::TransactionUpdate { order } => serde_json::to_value(order)?,
            Self::PourUpdate { transactions } => serde_json::json!({ "transactions": transactions }),
        };
        Ok(Envelope { kind: self.kind(), data: Some(data), status: None, timestamp: at })
    }
}
