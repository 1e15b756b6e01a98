use axum::{
    Router,
    routing::{get, post},
};

pub mod common;
pub mod drinks;
pub mod orders;
pub mod pours;
pub mod realtime;
pub mod system;

/// Router for everything under `/api`.
pub fn router() -> Router {
    Router::new()
        .route("/drinks", get(drinks::list_drinks))
        .route("/pour-sizes", get(drinks::list_pour_sizes))
        .route("/orders", post(orders::create_order))
        .route("/orders/:id", get(orders::get_order))
        .route("/pour-transactions/track", post(pours::track_pour))
}
