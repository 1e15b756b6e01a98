use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};

use pourline_infra::realtime::ConnectionRegistry;

use crate::app::services::AppServices;

pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "connections": services.realtime.registry().len(),
    }))
}
