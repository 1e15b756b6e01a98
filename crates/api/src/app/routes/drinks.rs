use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};

use pourline_events::{Broadcaster, RealtimeEvent, StockLevel};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// GET /api/drinks
///
/// Also pushes the full stock list to every realtime connection, which
/// doubles as the manual refresh for displays.
pub async fn list_drinks(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let drinks = match services.store.list_drinks().await {
        Ok(drinks) => drinks,
        Err(e) => return errors::store_error_to_response(e),
    };

    let event = RealtimeEvent::InventoryUpdate { drinks: drinks.iter().map(StockLevel::from).collect() };
    let report = services.realtime.broadcast(&event, None);
    tracing::debug!(drinks = drinks.len(), delivered = report.delivered, "catalog broadcast");

    Json(dto::DrinksResponse { drinks }).into_response()
}

/// GET /api/pour-sizes
pub async fn list_pour_sizes(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.store.list_pour_sizes().await {
        Ok(pour_sizes) => Json(dto::PourSizesResponse { pour_sizes }).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
