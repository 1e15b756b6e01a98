//! Client-side inventory synchronization.
//!
//! A register or display keeps a local copy of drink stock, adjusts it
//! optimistically while a cart is being built, and lets every server
//! broadcast overwrite it. Nothing here talks to storage.

pub mod checkout;
pub mod client;
pub mod error;
pub mod http;
pub mod reconnect;

pub use checkout::{CheckoutError, CheckoutSession, DraftItem, OrderConfirmation, OrderDraft, OrderSubmitter};
pub use error::{ApiError, InsufficientLine};
pub use client::{InventorySyncClient, SyncError};
pub use http::ApiClient;
pub use reconnect::{ConnectivityState, ReconnectPolicy, ReconnectStep, Reconnector};
