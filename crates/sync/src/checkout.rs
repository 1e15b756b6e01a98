//! Register-side checkout: cart, optimistic stock and the single commit call.
//!
//! Each drink in the cart holds one optimistic reservation equal to its line
//! quantity. The cart is locked for the duration of the submit. On success
//! the server's stock replaces the reservations and the cart is cleared; on
//! rejection every reservation is rolled back and the cart is unlocked with
//! its lines intact.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use pourline_core::{CorrelationId, DrinkId};
use pourline_events::{Envelope, StockLevel};
use pourline_sales::{Cart, CartAction, Order, reduce};

use crate::client::{InventorySyncClient, SyncError};
use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftItem {
    pub drink_id: DrinkId,
    pub quantity: i64,
    pub price: i64,
}

/// Order request body as the register sends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub items: Vec<DraftItem>,
    pub total: i64,
}

impl OrderDraft {
    pub fn from_cart(cart: &Cart) -> Self {
        let items = cart
            .lines
            .iter()
            .filter(|l| l.quantity > 0)
            .map(|l| DraftItem { drink_id: l.drink.drink_id, quantity: l.quantity, price: l.drink.price })
            .collect();
        Self { items, total: cart.subtotal() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    pub order: Order,
    pub inventory_updates: Vec<StockLevel>,
}

#[async_trait]
pub trait OrderSubmitter: Send + Sync {
    async fn submit(&self, draft: &OrderDraft) -> Result<OrderConfirmation, ApiError>;
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("an order is already being submitted")]
    InProgress,
    #[error(transparent)]
    Rejected(#[from] ApiError),
}

#[derive(Debug, Clone, Copy)]
struct Reservation {
    correlation: CorrelationId,
    quantity: i64,
}

#[derive(Debug, Default)]
pub struct CheckoutSession {
    cart: Cart,
    inventory: InventorySyncClient,
    reservations: HashMap<DrinkId, Reservation>,
}

impl CheckoutSession {
    pub fn new(inventory: InventorySyncClient) -> Self {
        Self { inventory, ..Self::default() }
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn inventory(&self) -> &InventorySyncClient {
        &self.inventory
    }

    pub fn inventory_mut(&mut self) -> &mut InventorySyncClient {
        &mut self.inventory
    }

    /// Apply a cart action and bring reservations in line with the result.
    pub fn dispatch(&mut self, action: CartAction) {
        let before = self.cart.clone();
        self.cart = reduce(std::mem::take(&mut self.cart), action);
        if self.cart != before {
            self.sync_reservations(&before);
        }
    }

    /// Feed a realtime envelope to the stock cache.
    pub fn apply_envelope(&mut self, envelope: &Envelope) -> Result<usize, SyncError> {
        self.inventory.apply_envelope(envelope)
    }

    /// Submit the cart as one order.
    pub async fn checkout<O>(&mut self, submitter: &O) -> Result<Order, CheckoutError>
    where
        O: OrderSubmitter + ?Sized,
    {
        if self.cart.locked {
            return Err(CheckoutError::InProgress);
        }
        if self.cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let draft = OrderDraft::from_cart(&self.cart);
        self.cart = reduce(std::mem::take(&mut self.cart), CartAction::SetProcessing { processing: true });

        match submitter.submit(&draft).await {
            Ok(confirmation) => {
                for level in &confirmation.inventory_updates {
                    self.inventory.apply_server_update(level);
                }
                // Anything not covered by the response is dropped too.
                self.rollback_reservations();
                self.cart = reduce(std::mem::take(&mut self.cart), CartAction::ClearCart);
                tracing::info!(order_id = %confirmation.order.id, total = confirmation.order.total, "order confirmed");
                Ok(confirmation.order)
            }
            Err(err) => {
                let rolled_back = self.rollback_reservations();
                self.cart = reduce(std::mem::take(&mut self.cart), CartAction::SetProcessing { processing: false });
                tracing::info!(error = %err, rolled_back, "order rejected");
                Err(err.into())
            }
        }
    }

    fn sync_reservations(&mut self, before: &Cart) {
        let drinks: HashSet<DrinkId> = before
            .lines
            .iter()
            .chain(self.cart.lines.iter())
            .map(|l| l.drink.drink_id)
            .collect();

        for drink_id in drinks {
            let wanted = self.cart.line(drink_id).map_or(0, |l| l.quantity);
            let held = self.reservations.get(&drink_id).map_or(0, |r| r.quantity);
            if wanted == held {
                continue;
            }
            if let Some(old) = self.reservations.remove(&drink_id) {
                self.inventory.rollback(old.correlation);
            }
            if wanted == 0 {
                continue;
            }
            if !self.inventory.contains(drink_id) {
                tracing::debug!(%drink_id, "cart line has no cached stock, nothing to reserve");
                continue;
            }
            match self.inventory.add_optimistic(drink_id, -wanted) {
                Ok(correlation) => {
                    self.reservations.insert(drink_id, Reservation { correlation, quantity: wanted });
                }
                Err(e) => tracing::warn!(error = %e, "optimistic reservation failed"),
            }
        }
    }

    fn rollback_reservations(&mut self) -> usize {
        self.reservations
            .drain()
            .filter(|(_, r)| self.inventory.rollback(r.correlation))
            .count()
    }
}
