//! Tax and pour decomposition for committed order lines.
//!
//! Pure computation over a catalog snapshot; loading that snapshot is the
//! caller's job.

pub mod calculator;
pub mod catalog;
pub mod rounding;

pub use calculator::{PourTracking, TaxBreakdown, calculate, scaled_pour_tax};
pub use catalog::{CatalogSnapshot, TaxCatalog};
pub use rounding::round_to_minor;
