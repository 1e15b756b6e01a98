//! Store-independent steps of a commit and of a manual pour.
//!
//! Both store implementations load and lock rows their own way, then hand the
//! rows to these functions so the business rules live in one place.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use pourline_core::{DrinkId, OrderId, PourInventoryId, PourTransactionId};
use pourline_inventory::{Drink, PourInventory, PourSize, PourTransaction};
use pourline_sales::{Order, OrderItem, OrderLine};
use pourline_tax::{CatalogSnapshot, PourTracking, TaxBreakdown, calculate, round_to_minor, scaled_pour_tax};

use super::{InsufficientItem, PourOutcome, PourRefusal, PourRequest, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockCheck {
    Available,
    Unknown(Vec<DrinkId>),
    Insufficient(Vec<InsufficientItem>),
}

/// Compare requested quantities with the (locked) drink rows.
pub fn check_stock(lines: &[OrderLine], drinks: &HashMap<DrinkId, Drink>) -> StockCheck {
    let unknown: Vec<DrinkId> = lines
        .iter()
        .filter(|l| !drinks.contains_key(&l.drink_id))
        .map(|l| l.drink_id)
        .collect();
    if !unknown.is_empty() {
        return StockCheck::Unknown(unknown);
    }

    let insufficient: Vec<InsufficientItem> = lines
        .iter()
        .filter_map(|l| {
            let drink = drinks.get(&l.drink_id)?;
            (!drink.can_fulfil(l.quantity)).then(|| InsufficientItem {
                drink_id: drink.id,
                name: drink.name.clone(),
                requested: l.quantity,
                available: drink.inventory,
            })
        })
        .collect();
    if insufficient.is_empty() {
        StockCheck::Available
    } else {
        StockCheck::Insufficient(insufficient)
    }
}

/// Price the order from the catalog and compute its tax and pours.
pub fn build_order(
    order_id: OrderId,
    lines: &[OrderLine],
    catalog: &CatalogSnapshot,
    at: DateTime<Utc>,
) -> Result<(Order, TaxBreakdown), StoreError> {
    let items = lines
        .iter()
        .map(|l| {
            let drink = catalog
                .drinks
                .get(&l.drink_id)
                .ok_or_else(|| StoreError::Internal(format!("drink {} vanished during commit", l.drink_id)))?;
            Ok(OrderItem {
                drink_id: drink.id,
                name: drink.name.clone(),
                unit_price: drink.price,
                quantity: l.quantity,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    let breakdown = calculate(lines, catalog);
    let order = Order::pending(order_id, items, breakdown.total_tax, at)
        .map_err(|e| StoreError::Internal(e.to_string()))?;
    Ok((order, breakdown))
}

/// Draw each pour from the active bottles of its drink, oldest first.
///
/// `bottles` must be ordered oldest first. A pour that spans bottles yields
/// one transaction per bottle touched, with the exact tax split by volume so
/// the rows still sum to the pour's tax. Volume no bottle could cover is
/// returned as a row with no bottle reference, so its tax stays on the ledger.
pub fn bind_pours(
    pours: &[PourTracking],
    bottles: &mut [PourInventory],
    order_id: OrderId,
    at: DateTime<Utc>,
) -> Vec<PourTransaction> {
    let mut transactions = Vec::with_capacity(pours.len());
    for pour in pours {
        let mut draws: Vec<(Option<PourInventoryId>, Decimal)> = Vec::new();
        let mut outstanding = pour.volume_oz;
        for bottle in bottles
            .iter_mut()
            .filter(|b| b.drink_id == pour.drink_id && b.active)
        {
            if outstanding <= Decimal::ZERO {
                break;
            }
            let taken = bottle.draw(outstanding);
            if taken > Decimal::ZERO {
                draws.push((Some(bottle.id), taken));
                outstanding -= taken;
            }
        }
        if outstanding > Decimal::ZERO || draws.is_empty() {
            tracing::warn!(
                drink_id = %pour.drink_id,
                %order_id,
                uncovered = %outstanding,
                "no active bottle left for pour"
            );
            draws.push((None, outstanding));
        }

        let mut tax_left = pour.tax;
        let last = draws.len() - 1;
        for (i, (pour_inventory_id, volume)) in draws.into_iter().enumerate() {
            let tax_amount = if i == last || pour.volume_oz.is_zero() {
                tax_left
            } else {
                pour.tax * volume / pour.volume_oz
            };
            tax_left -= tax_amount;
            transactions.push(PourTransaction {
                id: PourTransactionId::new(),
                pour_inventory_id,
                drink_id: pour.drink_id,
                pour_size_id: pour.pour_size_id,
                volume_oz: volume,
                tax_amount,
                order_id: Some(order_id),
                staff_id: None,
                created_at: at,
            });
        }
    }
    transactions
}

/// Rows a manual pour needs, as loaded (and locked) by the store.
#[derive(Debug, Clone, Default)]
pub struct ManualPourRows {
    pub bottle: Option<PourInventory>,
    pub size: Option<PourSize>,
    pub default_size: Option<PourSize>,
    pub drink: Option<Drink>,
    /// Tax rate of `drink`, as a percentage.
    pub rate: Decimal,
}

/// Validate and apply a manual pour to the loaded rows.
pub fn plan_manual_pour(
    request: PourRequest,
    rows: ManualPourRows,
    at: DateTime<Utc>,
) -> Result<PourOutcome, StoreError> {
    let Some(size) = rows.size else {
        return Ok(PourOutcome::Refused(PourRefusal::UnknownPourSize));
    };
    let Some(mut bottle) = rows.bottle else {
        return Ok(PourOutcome::Refused(PourRefusal::UnknownBottle));
    };
    if !bottle.active {
        return Ok(PourOutcome::Refused(PourRefusal::BottleInactive));
    }
    if bottle.remaining_volume < size.volume_oz {
        return Ok(PourOutcome::Refused(PourRefusal::InsufficientVolume {
            requested: size.volume_oz,
            remaining: bottle.remaining_volume,
        }));
    }
    let drink = rows
        .drink
        .ok_or_else(|| StoreError::Internal(format!("bottle {} references a missing drink", bottle.id)))?;

    bottle
        .pour(size.volume_oz)
        .map_err(|e| StoreError::Internal(e.to_string()))?;

    let default_volume = rows.default_size.map(|d| d.volume_oz).unwrap_or(size.volume_oz);
    let exact = scaled_pour_tax(drink.price, rows.rate, size.volume_oz, default_volume);

    let transaction = PourTransaction {
        id: PourTransactionId::new(),
        pour_inventory_id: Some(bottle.id),
        drink_id: drink.id,
        pour_size_id: Some(size.id),
        volume_oz: size.volume_oz,
        tax_amount: Decimal::from(round_to_minor(exact)),
        order_id: None,
        staff_id: request.staff_id,
        created_at: at,
    };
    Ok(PourOutcome::Recorded { transaction, bottle })
}
