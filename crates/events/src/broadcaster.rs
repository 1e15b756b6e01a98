//! Fan-out seam between order processing and realtime delivery.
//!
//! Delivery is best-effort and at-most-once per connection. `broadcast` only
//! enqueues and must never wait on a slow or dead client; failures are
//! reported back as counts for logging, never as errors.

use std::sync::Arc;

use pourline_core::ConnectionId;

use crate::event::RealtimeEvent;

/// Outcome of one fan-out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub skipped_originator: usize,
    pub failed: usize,
}

pub trait Broadcaster: Send + Sync {
    /// Send `event` to every open connection, leaving out `origin` when the
    /// event kind asks for it.
    fn broadcast(&self, event: &RealtimeEvent, origin: Option<ConnectionId>) -> BroadcastReport;
}

impl<B> Broadcaster for Arc<B>
where
    B: Broadcaster + ?Sized,
{
    fn broadcast(&self, event: &RealtimeEvent, origin: Option<ConnectionId>) -> BroadcastReport {
        (**self).broadcast(event, origin)
    }
}
