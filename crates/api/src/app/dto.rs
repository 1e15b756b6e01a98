use std::str::FromStr;

use serde::{Deserialize, Serialize};

use pourline_core::{PourInventoryId, PourSizeId, StaffId};
use pourline_events::StockLevel;
use pourline_infra::store::{InsufficientItem, PourRequest};
use pourline_inventory::{Drink, PourSize};
use pourline_sales::{Order, OrderLine};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub drink_id: String,
    pub quantity: i64,
    /// Advisory; the server prices from its catalog.
    #[serde(default)]
    pub price: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
    /// Advisory, like the per-item price.
    #[serde(default)]
    pub total: Option<i64>,
}

impl CreateOrderRequest {
    pub fn order_lines(&self) -> Result<Vec<OrderLine>, String> {
        self.items
            .iter()
            .map(|item| {
                let drink_id = item
                    .drink_id
                    .parse()
                    .map_err(|_| format!("invalid drink id `{}`", item.drink_id))?;
                Ok(OrderLine { drink_id, quantity: item.quantity })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPourRequest {
    pub pour_inventory_id: String,
    pub pour_size_id: String,
    #[serde(default)]
    pub staff_id: Option<String>,
}

impl TrackPourRequest {
    pub fn to_request(&self) -> Result<PourRequest, String> {
        Ok(PourRequest {
            pour_inventory_id: parse_id::<PourInventoryId>("pourInventoryId", &self.pour_inventory_id)?,
            pour_size_id: parse_id::<PourSizeId>("pourSizeId", &self.pour_size_id)?,
            staff_id: self
                .staff_id
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(|s| parse_id::<StaffId>("staffId", s))
                .transpose()?,
        })
    }
}

fn parse_id<T: FromStr>(field: &str, raw: &str) -> Result<T, String> {
    raw.parse().map_err(|_| format!("invalid {field} `{raw}`"))
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct DrinksResponse {
    pub drinks: Vec<Drink>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PourSizesResponse {
    pub pour_sizes: Vec<PourSize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedResponse {
    pub order: Order,
    pub inventory_updates: Vec<StockLevel>,
}

#[derive(Debug, Serialize)]
pub struct InsufficientItemDto {
    pub name: String,
    pub requested: i64,
    pub available: i64,
}

impl From<&InsufficientItem> for InsufficientItemDto {
    fn from(item: &InsufficientItem) -> Self {
        Self { name: item.name.clone(), requested: item.requested, available: item.available }
    }
}
