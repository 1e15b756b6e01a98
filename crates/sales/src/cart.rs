//! Cart state machine.
//!
//! The cart is `idle` while `locked == false` and `locked` while an order is
//! in flight. Every transition is a pure `(Cart, CartAction) -> Cart` step and
//! never fails: actions that do not apply return the state unchanged.

use serde::{Deserialize, Serialize};

use pourline_core::DrinkId;

use crate::order::OrderLine;

/// Upper bound for a single cart line.
pub const MAX_LINE_QUANTITY: i64 = 99;

/// The part of a catalog drink a cart line needs to display itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartDrink {
    pub drink_id: DrinkId,
    pub name: String,
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub drink: CartDrink,
    pub quantity: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
    pub locked: bool,
}

/// Cart transitions. Wire names match the client action types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CartAction {
    AddItem { drink: CartDrink, quantity: i64 },
    RemoveItem { drink_id: DrinkId },
    SetProcessing { processing: bool },
    ClearCart,
    /// Any action type this build does not know about.
    #[serde(other)]
    Unknown,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.quantity == 0)
    }

    pub fn line(&self, drink_id: DrinkId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.drink.drink_id == drink_id)
    }

    /// Sum of line prices in minor units, before tax.
    pub fn subtotal(&self) -> i64 {
        self.lines.iter().map(|l| l.drink.price * l.quantity).sum()
    }

    /// Lines ready for submission. Zero-quantity lines are left out.
    pub fn order_lines(&self) -> Vec<OrderLine> {
        self.lines
            .iter()
            .filter(|l| l.quantity > 0)
            .map(|l| OrderLine { drink_id: l.drink.drink_id, quantity: l.quantity })
            .collect()
    }
}

/// Apply one action to the cart.
pub fn reduce(mut state: Cart, action: CartAction) -> Cart {
    match action {
        CartAction::AddItem { drink, quantity } => {
            if state.locked {
                return state;
            }
            match state.lines.iter_mut().find(|l| l.drink.drink_id == drink.drink_id) {
                Some(line) => {
                    line.quantity = clamp_quantity(line.quantity.saturating_add(quantity));
                }
                None if quantity > 0 => state.lines.push(CartLine {
                    drink,
                    quantity: clamp_quantity(quantity),
                }),
                None => {}
            }
            state
        }
        CartAction::RemoveItem { drink_id } => {
            if !state.locked {
                state.lines.retain(|l| l.drink.drink_id != drink_id);
            }
            state
        }
        CartAction::SetProcessing { processing } => {
            state.locked = processing;
            state
        }
        CartAction::ClearCart => Cart::default(),
        CartAction::Unknown => state,
    }
}

fn clamp_quantity(quantity: i64) -> i64 {
    quantity.clamp(0, MAX_LINE_QUANTITY)
}
