use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pourline_core::{DomainError, DrinkId, OrderId};

use crate::cart::MAX_LINE_QUANTITY;

/// Order status lifecycle: `pending` → `completed` | `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Failed,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A requested line: how many of which drink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub drink_id: DrinkId,
    pub quantity: i64,
}

/// Snapshot of a sold line. Name and price are copied from the catalog at
/// commit time so later catalog edits do not rewrite history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub drink_id: DrinkId,
    pub name: String,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: i64,
    pub quantity: i64,
}

impl OrderItem {
    pub fn line_total(&self) -> i64 {
        self.unit_price * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Build a new pending order. `total` is always `subtotal + tax`.
    pub fn pending(
        id: OrderId,
        items: Vec<OrderItem>,
        tax: i64,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if items.is_empty() {
            return Err(DomainError::validation("order must have at least one item"));
        }
        if items.iter().any(|i| i.quantity <= 0) {
            return Err(DomainError::validation("order item quantity must be positive"));
        }
        if tax < 0 {
            return Err(DomainError::invariant("tax cannot be negative"));
        }
        let subtotal = items.iter().map(OrderItem::line_total).sum::<i64>();
        Ok(Self {
            id,
            status: OrderStatus::Pending,
            items,
            subtotal,
            tax,
            total: subtotal + tax,
            created_at,
            completed_at: None,
        })
    }

    pub fn complete(&mut self, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_pending()?;
        self.status = OrderStatus::Completed;
        self.completed_at = Some(at);
        Ok(())
    }

    pub fn fail(&mut self) -> Result<(), DomainError> {
        self.ensure_pending()?;
        self.status = OrderStatus::Failed;
        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), DomainError> {
        if self.status != OrderStatus::Pending {
            return Err(DomainError::conflict(format!(
                "order is already {}",
                self.status.as_str()
            )));
        }
        Ok(())
    }
}

/// Validate requested lines and sum duplicates per drink.
///
/// Each request line must have `1 <= quantity <= 99`. The result keeps the
/// order in which each drink first appeared.
pub fn aggregate_lines(lines: &[OrderLine]) -> Result<Vec<OrderLine>, DomainError> {
    if lines.is_empty() {
        return Err(DomainError::validation("order must have at least one item"));
    }

    let mut merged: Vec<OrderLine> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity <= 0 {
            return Err(DomainError::validation(format!(
                "quantity for drink {} must be positive",
                line.drink_id
            )));
        }
        if line.quantity > MAX_LINE_QUANTITY {
            return Err(DomainError::validation(format!(
                "quantity for drink {} exceeds {}",
                line.drink_id, MAX_LINE_QUANTITY
            )));
        }
        match merged.iter_mut().find(|m| m.drink_id == line.drink_id) {
            Some(existing) => existing.quantity += line.quantity,
            None => merged.push(*line),
        }
    }
    Ok(merged)
}
