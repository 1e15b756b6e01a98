//! `pourline-core`: shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::DomainError;
pub use id::{
    ConnectionId, CorrelationId, DrinkId, OrderId, PourInventoryId, PourSizeId,
    PourTransactionId, StaffId, TaxCategoryId,
};
