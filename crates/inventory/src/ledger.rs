//! Append-only pour ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pourline_core::{DrinkId, OrderId, PourInventoryId, PourSizeId, PourTransactionId, StaffId};

/// One dispensing event, kept for tax liability and bottle depletion.
///
/// `pour_inventory_id` is `None` when no active bottle could be found for the
/// drink at the time of a sale. `tax_amount` is exact, in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PourTransaction {
    pub id: PourTransactionId,
    pub pour_inventory_id: Option<PourInventoryId>,
    pub drink_id: DrinkId,
    pub pour_size_id: Option<PourSizeId>,
    pub volume_oz: Decimal,
    pub tax_amount: Decimal,
    pub order_id: Option<OrderId>,
    pub staff_id: Option<StaffId>,
    pub created_at: DateTime<Utc>,
}
