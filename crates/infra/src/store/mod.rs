//! Durable record of drinks, bottles, orders and the pour ledger.
//!
//! The store owns the transaction boundary. `commit_order` and `record_pour`
//! are each a single unit of work: either every write lands or none does.

pub mod in_memory;
pub mod plan;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use pourline_core::{DrinkId, OrderId, PourInventoryId, PourSizeId, StaffId};
use pourline_events::StockLevel;
use pourline_inventory::{Drink, PourInventory, PourSize, PourTransaction};
use pourline_sales::{Order, OrderLine};
use pourline_tax::CatalogSnapshot;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Connection loss, serialization failure, deadlock, timeout. Nothing was
    /// persisted and the whole operation may be retried.
    #[error("transient store failure: {0}")]
    Transient(String),

    /// Corrupt data or a broken invariant inside the store.
    #[error("internal store failure: {0}")]
    Internal(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Per-drink detail of an insufficient-stock rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsufficientItem {
    pub drink_id: DrinkId,
    pub name: String,
    pub requested: i64,
    pub available: i64,
}

/// What a successful commit wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedOrder {
    pub order: Order,
    /// Stock of every ordered drink after the decrement, in request order.
    pub stock: Vec<StockLevel>,
    pub pours: Vec<PourTransaction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(CommittedOrder),
    /// Nothing was written.
    Insufficient(Vec<InsufficientItem>),
    /// Nothing was written.
    UnknownDrinks(Vec<DrinkId>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PourRequest {
    pub pour_inventory_id: PourInventoryId,
    pub pour_size_id: PourSizeId,
    pub staff_id: Option<StaffId>,
}

/// Why a manual pour was refused. Nothing was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PourRefusal {
    UnknownPourSize,
    UnknownBottle,
    BottleInactive,
    InsufficientVolume { requested: Decimal, remaining: Decimal },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PourOutcome {
    Recorded { transaction: PourTransaction, bottle: PourInventory },
    Refused(PourRefusal),
}

/// Repository seam for inventory, orders and pours.
///
/// Implementations must make `commit_order` atomic with respect to concurrent
/// commits touching the same drinks: the stock check and the decrement happen
/// under the same lock or transaction.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn list_drinks(&self) -> Result<Vec<Drink>, StoreError>;

    async fn list_pour_sizes(&self) -> Result<Vec<PourSize>, StoreError>;

    /// Everything tax decomposition needs for `drink_ids`: the drinks, their
    /// recipes and ingredients, tax categories and the default pour size.
    async fn load_tax_catalog(&self, drink_ids: &[DrinkId]) -> Result<CatalogSnapshot, StoreError>;

    /// Check stock, decrement it, write the pending order with its items and
    /// write the pour ledger entries, all or nothing.
    ///
    /// `lines` must already be aggregated per drink with positive quantities.
    async fn commit_order(
        &self,
        order_id: OrderId,
        lines: &[OrderLine],
        at: DateTime<Utc>,
    ) -> Result<CommitOutcome, StoreError>;

    /// Move a pending order to `completed`.
    async fn complete_order(&self, order_id: OrderId, at: DateTime<Utc>) -> Result<Order, StoreError>;

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Pour from one bottle and append the ledger entry, all or nothing.
    async fn record_pour(&self, request: PourRequest, at: DateTime<Utc>) -> Result<PourOutcome, StoreError>;
}

#[async_trait]
impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    async fn list_drinks(&self) -> Result<Vec<Drink>, StoreError> {
        (**self).list_drinks().await
    }

    async fn list_pour_sizes(&self) -> Result<Vec<PourSize>, StoreError> {
        (**self).list_pour_sizes().await
    }

    async fn load_tax_catalog(&self, drink_ids: &[DrinkId]) -> Result<CatalogSnapshot, StoreError> {
        (**self).load_tax_catalog(drink_ids).await
    }

    async fn commit_order(
        &self,
        order_id: OrderId,
        lines: &[OrderLine],
        at: DateTime<Utc>,
    ) -> Result<CommitOutcome, StoreError> {
        (**self).commit_order(order_id, lines, at).await
    }

    async fn complete_order(&self, order_id: OrderId, at: DateTime<Utc>) -> Result<Order, StoreError> {
        (**self).complete_order(order_id, at).await
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        (**self).get_order(order_id).await
    }

    async fn record_pour(&self, request: PourRequest, at: DateTime<Utc>) -> Result<PourOutcome, StoreError> {
        (**self).record_pour(request, at).await
    }
}
