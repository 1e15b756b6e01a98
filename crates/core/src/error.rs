//! Errors raised by the pure domain types (drinks, bottles, carts, orders).

use thiserror::Error;

/// A domain rule refused an operation.
///
/// Store and transport failures never show up here; they are mapped by the
/// infra layer into its own error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input that can never be valid, such as a zero quantity or a negative price.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation would break a stock or volume rule.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The entity is in a state that does not allow the operation, such as a
    /// retired bottle or an order that already completed.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
