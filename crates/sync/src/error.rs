use serde::{Deserialize, Serialize};

/// One drink the server could not fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsufficientLine {
    pub name: String,
    pub requested: i64,
    pub available: i64,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("insufficient inventory for {} item(s)", .0.len())]
    InsufficientInventory(Vec<InsufficientLine>),

    #[error("API error ({status}) {code}: {message}")]
    Api { status: u16, code: String, message: String, retryable: bool },

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl ApiError {
    /// Whether resubmitting the same request unchanged may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api { retryable, .. } => *retryable,
            Self::InsufficientInventory(_) | Self::Parse(_) => false,
        }
    }
}
