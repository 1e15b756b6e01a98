use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `type` field of an [`Envelope`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvelopeKind {
    #[serde(rename = "status")]
    Status,
    #[serde(rename = "INVENTORY_UPDATE")]
    InventoryUpdate,
    #[serde(rename = "POUR_UPDATE")]
    PourUpdate,
    #[serde(rename = "TRANSACTION_UPDATE")]
    TransactionUpdate,
    #[serde(rename = "error")]
    Error,
    /// A type this build does not know. Receivers ignore it.
    #[serde(other)]
    Unknown,
}

/// Message sent over a realtime connection.
///
/// `{ type, data?, status?, timestamp }` with an RFC 3339 timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    pub fn status(status: impl Into<String>, data: Option<serde_json::Value>, at: DateTime<Utc>) -> Self {
        Self { kind: EnvelopeKind::Status, data, status: Some(status.into()), timestamp: at }
    }

    pub fn error(message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            kind: EnvelopeKind::Error,
            data: Some(serde_json::json!({ "message": message.into() })),
            status: None,
            timestamp: at,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
