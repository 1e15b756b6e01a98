use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use pourline_core::OrderId;
use pourline_infra::commit::CommitReceipt;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// POST /api/orders
pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Result<Json<dto::CreateOrderRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_input", e.body_text()),
    };
    let lines = match body.order_lines() {
        Ok(lines) => lines,
        Err(msg) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_input", msg),
    };

    match services.commits.commit(&lines, common::origin(&headers)).await {
        Ok(receipt) => {
            log_price_drift(&body, &receipt);
            Json(dto::OrderCreatedResponse {
                order: receipt.order,
                inventory_updates: receipt.inventory_updates,
            })
            .into_response()
        }
        Err(rejection) => errors::rejection_to_response(rejection),
    }
}

/// GET /api/orders/:id
pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id"),
    };

    match services.store.get_order(order_id).await {
        Ok(Some(order)) => Json(order).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Client prices are advisory; note where they disagree with the catalog.
fn log_price_drift(request: &dto::CreateOrderRequest, receipt: &CommitReceipt) {
    for item in &request.items {
        let Some(client_price) = item.price else { continue };
        let catalog_price = receipt
            .order
            .items
            .iter()
            .find(|line| line.drink_id.to_string() == item.drink_id.trim())
            .map(|line| line.unit_price);
        if let Some(catalog_price) = catalog_price.filter(|p| *p != client_price) {
            tracing::debug!(drink_id = %item.drink_id, client_price, catalog_price, "client price differs from catalog");
        }
    }
    if let Some(total) = request.total.filter(|t| *t != receipt.order.total) {
        tracing::debug!(client_total = total, order_total = receipt.order.total, "client total differs from server total");
    }
}
