//! HTTP client for the register: catalog fetch and order submission.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use pourline_core::ConnectionId;
use pourline_inventory::Drink;

use crate::checkout::{OrderConfirmation, OrderDraft, OrderSubmitter};
use crate::error::{ApiError, InsufficientLine};

const CONNECTION_ID_HEADER: &str = "X-Connection-Id";

#[derive(Debug, Deserialize)]
struct DrinksBody {
    drinks: Vec<Drink>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    items: Option<Vec<InsufficientLine>>,
    #[serde(default)]
    retryable: bool,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    api_url: String,
    connection_id: Option<ConnectionId>,
}

impl ApiClient {
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { http: reqwest::Client::new(), api_url, connection_id: None }
    }

    /// Identify this register's realtime connection so its own order events
    /// are not echoed back to it.
    pub fn with_connection_id(mut self, id: ConnectionId) -> Self {
        self.connection_id = Some(id);
        self
    }

    /// Check connectivity by hitting the health endpoint.
    pub async fn check_connectivity(&self) -> bool {
        let url = format!("{}/health", self.api_url);
        matches!(self.http.get(&url).send().await, Ok(resp) if resp.status().is_success())
    }

    /// Full catalog with current stock. Used for the initial load, the manual
    /// refresh and after a reconnect.
    pub async fn fetch_drinks(&self) -> Result<Vec<Drink>, ApiError> {
        let url = format!("{}/api/drinks", self.api_url);
        let resp = self.http.get(&url).send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        let body: DrinksBody = resp.json().await.map_err(|e| ApiError::Parse(e.to_string()))?;
        Ok(body.drinks)
    }
}

#[async_trait]
impl OrderSubmitter for ApiClient {
    async fn submit(&self, draft: &OrderDraft) -> Result<OrderConfirmation, ApiError> {
        let url = format!("{}/api/orders", self.api_url);
        let mut req = self.http.post(&url).json(draft);
        if let Some(id) = self.connection_id {
            req = req.header(CONNECTION_ID_HEADER, id.to_string());
        }

        let resp = req.send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        resp.json().await.map_err(|e| ApiError::Parse(e.to_string()))
    }
}

async fn error_from_response(resp: reqwest::Response) -> ApiError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();

    match body.items {
        Some(items) if status == StatusCode::BAD_REQUEST && body.error == "insufficient_inventory" => {
            ApiError::InsufficientInventory(items)
        }
        _ => ApiError::Api {
            status: status.as_u16(),
            code: body.error,
            message: if body.message.is_empty() { text } else { body.message },
            retryable: body.retryable,
        },
    }
}
