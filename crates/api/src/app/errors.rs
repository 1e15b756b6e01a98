use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use pourline_infra::commit::Rejection;
use pourline_infra::pour::PourTrackingError;
use pourline_infra::store::StoreError;

use crate::app::dto::InsufficientItemDto;

pub fn rejection_to_response(rejection: Rejection) -> Response {
    match rejection {
        Rejection::InvalidInput(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_input", msg),
        Rejection::InsufficientInventory(items) => {
            let items: Vec<InsufficientItemDto> = items.iter().map(InsufficientItemDto::from).collect();
            (
                StatusCode::BAD_REQUEST,
                axum::Json(json!({
                    "error": "insufficient_inventory",
                    "message": "Insufficient inventory",
                    "items": items,
                })),
            )
                .into_response()
        }
        Rejection::PersistenceFailure(msg) => server_error("persistence_failure", msg, true),
        Rejection::InternalError(msg) => server_error("internal_error", msg, false),
    }
}

pub fn pour_error_to_response(err: PourTrackingError) -> Response {
    let message = err.to_string();
    match err {
        PourTrackingError::InvalidPourSize => json_error(StatusCode::BAD_REQUEST, "invalid_pour_size", message),
        PourTrackingError::UnknownBottle => json_error(StatusCode::BAD_REQUEST, "unknown_bottle", message),
        PourTrackingError::BottleInactive => json_error(StatusCode::BAD_REQUEST, "bottle_inactive", message),
        PourTrackingError::InsufficientVolume { .. } => {
            json_error(StatusCode::BAD_REQUEST, "insufficient_volume", message)
        }
        PourTrackingError::Store(e) => store_error_to_response(e),
    }
}

pub fn store_error_to_response(err: StoreError) -> Response {
    match err {
        StoreError::Transient(msg) => server_error("store_unavailable", msg, true),
        StoreError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        StoreError::Internal(msg) => server_error("store_error", msg, false),
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

fn server_error(code: &'static str, message: String, retryable: bool) -> Response {
    tracing::error!(code, retryable, %message, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(json!({
            "error": code,
            "message": message,
            "retryable": retryable,
        })),
    )
        .into_response()
}
