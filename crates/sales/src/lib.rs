//! Sales domain module.
//!
//! The cart reducer and the order snapshot model, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod cart;
pub mod order;

pub use cart::{Cart, CartAction, CartDrink, CartLine, MAX_LINE_QUANTITY, reduce};
pub use order::{Order, OrderItem, OrderLine, OrderStatus, aggregate_lines};
