//! Order commit pipeline.
//!
//! ```text
//! requested lines
//!   ↓
//! 1. Validate and aggregate per drink (1..=99 per line, non-empty)
//!   ↓
//! 2. Store unit of work: lock drinks, check stock, decrement, write pending
//!    order + items, compute tax/pours, bind pours to bottles, write ledger
//!   ↓
//! 3. Mark the order completed (after the transaction has committed)
//!   ↓
//! 4. Announce: one INVENTORY_UPDATE per drink, one TRANSACTION_UPDATE,
//!    one POUR_UPDATE when pours were recorded
//! ```
//!
//! Expected business outcomes come back as a typed [`Rejection`]; nothing is
//! persisted for any rejection. Broadcast failures are logged, never returned.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pourline_core::{ConnectionId, OrderId};
use pourline_events::{Broadcaster, RealtimeEvent, StockLevel};
use pourline_inventory::PourTransaction;
use pourline_sales::{Order, OrderLine, aggregate_lines};

use crate::store::{CommitOutcome, InsufficientItem, InventoryStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Malformed request. Do not retry as-is.
    #[error("invalid order: {0}")]
    InvalidInput(String),

    /// Not enough stock for at least one drink. Adjust quantities and resubmit.
    #[error("insufficient inventory for {} item(s)", .0.len())]
    InsufficientInventory(Vec<InsufficientItem>),

    /// Nothing was persisted; the whole commit may be retried.
    #[error("order could not be persisted: {0}")]
    PersistenceFailure(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl Rejection {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PersistenceFailure(_))
    }
}

impl From<StoreError> for Rejection {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Transient(msg) => Rejection::PersistenceFailure(msg),
            StoreError::Internal(msg) | StoreError::NotFound(msg) => Rejection::InternalError(msg),
        }
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub order: Order,
    pub inventory_updates: Vec<StockLevel>,
    pub pours: Vec<PourTransaction>,
}

pub struct OrderCommitService<S, B> {
    store: S,
    broadcaster: B,
}

impl<S, B> OrderCommitService<S, B>
where
    S: InventoryStore,
    B: Broadcaster,
{
    pub fn new(store: S, broadcaster: B) -> Self {
        Self { store, broadcaster }
    }

    /// Commit `lines` as one order, all or nothing.
    ///
    /// `origin` is the realtime connection of the submitter, if known, so
    /// events that skip the originator are not echoed back to it.
    #[tracing::instrument(skip(self, lines), fields(line_count = lines.len()))]
    pub async fn commit(
        &self,
        lines: &[OrderLine],
        origin: Option<ConnectionId>,
    ) -> Result<CommitReceipt, Rejection> {
        let lines = aggregate_lines(lines).map_err(|e| Rejection::InvalidInput(e.to_string()))?;
        let order_id = OrderId::new();

        let committed = match self.store.commit_order(order_id, &lines, Utc::now()).await {
            Ok(CommitOutcome::Committed(committed)) => committed,
            Ok(CommitOutcome::Insufficient(items)) => {
                tracing::info!(%order_id, short = items.len(), "order rejected: insufficient inventory");
                return Err(Rejection::InsufficientInventory(items));
            }
            Ok(CommitOutcome::UnknownDrinks(ids)) => {
                let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
                tracing::info!(%order_id, unknown = ?ids, "order rejected: unknown drinks");
                return Err(Rejection::InvalidInput(format!("unknown drink(s): {}", ids.join(", "))));
            }
            Err(err) => {
                tracing::warn!(%order_id, error = %err, transient = err.is_transient(), "order commit failed");
                return Err(err.into());
            }
        };

        let order = match self.store.complete_order(order_id, Utc::now()).await {
            Ok(order) => order,
            Err(err) => {
                // Stock and ledger are already durable; the order stays pending.
                tracing::error!(%order_id, error = %err, "failed to mark committed order completed");
                committed.order.clone()
            }
        };

        tracing::info!(
            %order_id,
            total = order.total,
            tax = order.tax,
            pours = committed.pours.len(),
            status = order.status.as_str(),
            "order committed"
        );

        self.announce(&order, &committed.stock, &committed.pours, origin);

        Ok(CommitReceipt {
            order,
            inventory_updates: committed.stock,
            pours: committed.pours,
        })
    }

    fn announce(
        &self,
        order: &Order,
        stock: &[StockLevel],
        pours: &[PourTransaction],
        origin: Option<ConnectionId>,
    ) {
        let mut events: Vec<RealtimeEvent> = stock
            .iter()
            .map(|level| RealtimeEvent::InventoryUpdate { drinks: vec![level.clone()] })
            .collect();
        events.push(RealtimeEvent::TransactionUpdate { order: order.clone() });
        if !pours.is_empty() {
            events.push(RealtimeEvent::PourUpdate { transactions: pours.to_vec() });
        }

        for event in &events {
            let report = self.broadcaster.broadcast(event, origin);
            if report.failed > 0 {
                tracing::warn!(
                    order_id = %order.id,
                    kind = ?event.kind(),
                    failed = report.failed,
                    delivered = report.delivered,
                    "broadcast delivery failure"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use pourline_core::DrinkId;
    use pourline_events::RecordingBroadcaster;
    use pourline_sales::OrderStatus;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    use crate::seed::{CatalogSeed, demo_catalog};
    use crate::store::InMemoryInventoryStore;

    type Service = OrderCommitService<Arc<InMemoryInventoryStore>, Arc<RecordingBroadcaster>>;

    fn setup() -> (Service, Arc<InMemoryInventoryStore>, Arc<RecordingBroadcaster>, CatalogSeed) {
        let seed = demo_catalog().unwrap();
        let store = Arc::new(InMemoryInventoryStore::new());
        seed.load_into(&store).unwrap();
        let broadcaster = Arc::new(RecordingBroadcaster::new());
        (OrderCommitService::new(store.clone(), broadcaster.clone()), store, broadcaster, seed)
    }

    fn drink_id(seed: &CatalogSeed, name: &str) -> DrinkId {
        seed.drink_named(name).unwrap().id
    }

    fn line(drink_id: DrinkId, quantity: i64) -> OrderLine {
        OrderLine { drink_id, quantity }
    }

    #[tokio::test]
    async fn mojito_and_water_commit_records_one_pour_per_ingredient() {
        let (service, store, _, seed) = setup();
        let mojito = drink_id(&seed, "Mojito");
        let water = drink_id(&seed, "Bottled Water");
        let rum = drink_id(&seed, "White Rum");
        let rum_before = store.drink(rum).unwrap().unwrap().inventory;

        let receipt = service.commit(&[line(mojito, 2), line(water, 1)], None).await.unwrap();

        assert_eq!(receipt.order.status, OrderStatus::Completed);
        assert!(receipt.order.completed_at.is_some());
        assert_eq!(receipt.pours.len(), 2);
        assert!(receipt.pours.iter().all(|p| p.order_id == Some(receipt.order.id)));

        // rum 800 * 2.0oz * 8.25% * 2 = 264; syrup and water are untaxed
        assert_eq!(receipt.order.tax, 264);
        assert_eq!(receipt.order.subtotal, 2 * 1200 + 300);
        assert_eq!(receipt.order.total, receipt.order.subtotal + receipt.order.tax);

        // Ingredient draw happens at bottle level, not on the spirit's unit stock.
        assert_eq!(store.drink(rum).unwrap().unwrap().inventory, rum_before);
        assert_eq!(store.drink(mojito).unwrap().unwrap().inventory, 23);
        assert_eq!(store.drink(mojito).unwrap().unwrap().sales, 2);

        let rum_bottle = store.bottles().unwrap().into_iter().find(|b| b.drink_id == rum).unwrap();
        assert_eq!(rum_bottle.remaining_volume, Decimal::new(214, 1));
        assert_eq!(store.ledger().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn insufficient_stock_rejects_whole_order_and_changes_nothing() {
        let (service, store, broadcaster, seed) = setup();
        let bourbon = drink_id(&seed, "Bourbon");
        let water = drink_id(&seed, "Bottled Water");
        let mut drink = store.drink(bourbon).unwrap().unwrap();
        drink.inventory = 3;
        store.insert_drink(drink).unwrap();

        let err = service.commit(&[line(water, 1), line(bourbon, 5)], None).await.unwrap_err();
        match err {
            Rejection::InsufficientInventory(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].name, "Bourbon");
                assert_eq!((items[0].requested, items[0].available), (5, 3));
            }
            other => panic!("Expected InsufficientInventory, got {:?}", other),
        }

        assert_eq!(store.drink(bourbon).unwrap().unwrap().inventory, 3);
        assert_eq!(store.drink(water).unwrap().unwrap().inventory, 48);
        assert!(store.ledger().unwrap().is_empty());
        assert!(broadcaster.broadcasts().is_empty());
    }

    #[tokio::test]
    async fn duplicate_lines_are_checked_against_stock_together() {
        let (service, store, _, seed) = setup();
        let bourbon = drink_id(&seed, "Bourbon");
        let mut drink = store.drink(bourbon).unwrap().unwrap();
        drink.inventory = 4;
        store.insert_drink(drink).unwrap();

        let err = service.commit(&[line(bourbon, 3), line(bourbon, 2)], None).await.unwrap_err();
        match err {
            Rejection::InsufficientInventory(items) => assert_eq!(items[0].requested, 5),
            other => panic!("Expected InsufficientInventory, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_lines_are_rejected_before_the_store() {
        let (service, _, _, seed) = setup();
        let water = drink_id(&seed, "Bottled Water");

        assert!(matches!(service.commit(&[], None).await, Err(Rejection::InvalidInput(_))));
        assert!(matches!(service.commit(&[line(water, 0)], None).await, Err(Rejection::InvalidInput(_))));
        assert!(matches!(
            service.commit(&[line(DrinkId::new(), 1)], None).await,
            Err(Rejection::InvalidInput(msg)) if msg.contains("unknown drink")
        ));
    }

    #[tokio::test]
    async fn transient_store_failure_is_retryable_and_writes_nothing() {
        let (service, store, broadcaster, seed) = setup();
        let water = drink_id(&seed, "Bottled Water");
        store.fail_next_commit(StoreError::Transient("connection reset".into()));

        let err = service.commit(&[line(water, 1)], None).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.drink(water).unwrap().unwrap().inventory, 48);
        assert!(broadcaster.broadcasts().is_empty());

        // The retry goes through.
        assert!(service.commit(&[line(water, 1)], None).await.is_ok());
    }

    #[tokio::test]
    async fn internal_store_failure_is_not_retryable() {
        let (service, store, _, seed) = setup();
        store.fail_next_commit(StoreError::Internal("corrupt row".into()));
        let err = service.commit(&[line(drink_id(&seed, "Bourbon"), 1)], None).await.unwrap_err();
        assert_eq!(err, Rejection::InternalError("corrupt row".into()));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn completion_failure_leaves_order_pending_but_committed() {
        let (service, store, _, seed) = setup();
        let water = drink_id(&seed, "Bottled Water");
        store.fail_next_completion(StoreError::Transient("timeout".into()));

        let receipt = service.commit(&[line(water, 2)], None).await.unwrap();
        assert_eq!(receipt.order.status, OrderStatus::Pending);
        assert_eq!(store.drink(water).unwrap().unwrap().inventory, 46);
        let stored = store.get_order(receipt.order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn commit_announces_per_drink_inventory_and_one_transaction() {
        let (service, _, broadcaster, seed) = setup();
        let origin = ConnectionId::new();
        let mojito = drink_id(&seed, "Mojito");
        let water = drink_id(&seed, "Bottled Water");

        service.commit(&[line(mojito, 1), line(water, 1)], Some(origin)).await.unwrap();

        let sent = broadcaster.broadcasts();
        let kinds: Vec<_> = sent.iter().map(|b| b.event.kind()).collect();
        use pourline_events::EnvelopeKind::*;
        assert_eq!(kinds, vec![InventoryUpdate, InventoryUpdate, TransactionUpdate, PourUpdate]);
        assert!(sent.iter().all(|b| b.origin == Some(origin)));
        match &sent[0].event {
            RealtimeEvent::InventoryUpdate { drinks } => {
                assert_eq!(drinks.len(), 1);
                assert_eq!(drinks[0].drink_id, mojito);
                assert_eq!(drinks[0].inventory, 24);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_commits_never_oversell() {
        let (service, store, _, seed) = setup();
        let service = Arc::new(service);
        let bourbon = drink_id(&seed, "Bourbon");
        let mut drink = store.drink(bourbon).unwrap().unwrap();
        drink.inventory = 5;
        store.insert_drink(drink).unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.commit(&[line(bourbon, 3)], None).await })
            })
            .collect();

        let mut ok = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(Rejection::InsufficientInventory(items)) => {
                    assert_eq!((items[0].requested, items[0].available), (3, 2));
                    rejected += 1;
                }
                Err(other) => panic!("unexpected rejection {other:?}"),
            }
        }
        assert_eq!((ok, rejected), (1, 1));
        let after = store.drink(bourbon).unwrap().unwrap();
        assert_eq!(after.inventory, 2);
        assert_eq!(after.sales, 3);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            .. ProptestConfig::default()
        })]

        #[test]
        fn prop_successful_commits_decrement_exactly_what_was_requested(
            requests in proptest::collection::vec(proptest::collection::vec((0usize..5, 1i64..=12), 1..4), 1..8)
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let (service, store, _, seed) = setup();
            let ids: Vec<DrinkId> = seed.drinks.iter().map(|d| d.id).collect();
            let before: Vec<i64> = seed.drinks.iter().map(|d| d.inventory).collect();
            let mut decremented = vec![0i64; ids.len()];

            for request in requests {
                let lines: Vec<OrderLine> = request.iter().map(|(i, q)| line(ids[*i], *q)).collect();
                if runtime.block_on(service.commit(&lines, None)).is_ok() {
                    for (i, q) in &request {
                        decremented[*i] += q;
                    }
                }
            }

            for (i, id) in ids.iter().enumerate() {
                let drink = store.drink(*id).unwrap().unwrap();
                prop_assert!(drink.inventory >= 0);
                prop_assert_eq!(before[i] - drink.inventory, decremented[i]);
                prop_assert_eq!(drink.sales, decremented[i]);
            }
        }
    }
}
