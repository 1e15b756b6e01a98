//! Inventory domain module.
//!
//! Catalog drinks, bottle-level pour inventory, pour sizes, recipes and tax
//! categories, implemented as deterministic domain logic (no IO, no HTTP, no
//! storage).

pub mod bottle;
pub mod catalog;
pub mod drink;
pub mod ledger;

pub use bottle::PourInventory;
pub use catalog::{PourSize, Recipe, RecipeComponent, TaxCategory};
pub use drink::{Drink, ServingKind};
pub use ledger::PourTransaction;
