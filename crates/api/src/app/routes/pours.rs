use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// POST /api/pour-transactions/track
pub async fn track_pour(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Result<Json<dto::TrackPourRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_input", e.body_text()),
    };
    let request = match body.to_request() {
        Ok(request) => request,
        Err(msg) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_input", msg),
    };

    match services.pours.track(request, common::origin(&headers)).await {
        Ok(tracked) => (StatusCode::CREATED, Json(tracked.transaction)).into_response(),
        Err(e) => errors::pour_error_to_response(e),
    }
}
