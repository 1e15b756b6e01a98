//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store, realtime hub and the commit/pour services
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .route("/ws", get(routes::realtime::ws_upgrade))
        .nest("/api", routes::router())
        .layer(Extension(services))
}
