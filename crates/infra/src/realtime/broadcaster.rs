use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;

use pourline_core::ConnectionId;
use pourline_events::{BroadcastReport, Broadcaster, Envelope, RealtimeEvent};

use super::registry::{ConnectionRegistry, Outbound};

/// Fans realtime events out to every registered connection.
#[derive(Debug, Default)]
pub struct RealtimeBroadcaster<R> {
    registry: R,
}

impl<R: ConnectionRegistry> RealtimeBroadcaster<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Register a new connection and return its id and outbound queue.
    pub fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<Outbound>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        self.registry.register(id, tx);
        tracing::debug!(connection_id = %id, open = self.registry.len(), "connection registered");
        (id, rx)
    }

    pub fn disconnect(&self, id: ConnectionId) {
        if self.registry.remove(id) {
            tracing::debug!(connection_id = %id, open = self.registry.len(), "connection removed");
        }
    }

    /// Send an envelope to a single connection.
    pub fn send_to(&self, id: ConnectionId, envelope: &Envelope) -> bool {
        let Ok(text) = envelope.to_json() else { return false };
        self.registry
            .snapshot()
            .into_iter()
            .find(|(conn, _)| *conn == id)
            .is_some_and(|(_, tx)| tx.send(Arc::from(text)).is_ok())
    }
}

impl<R: ConnectionRegistry> Broadcaster for RealtimeBroadcaster<R> {
    fn broadcast(&self, event: &RealtimeEvent, origin: Option<ConnectionId>) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        let text = match event.to_envelope(Utc::now()).and_then(|env| env.to_json()) {
            Ok(text) => Outbound::from(text),
            Err(err) => {
                tracing::error!(kind = ?event.kind(), error = %err, "failed to serialize realtime event");
                report.failed = self.registry.len();
                return report;
            }
        };

        for (id, sender) in self.registry.snapshot() {
            if event.skips_originator() && origin == Some(id) {
                report.skipped_originator += 1;
                continue;
            }
            if sender.send(text.clone()).is_ok() {
                report.delivered += 1;
            } else {
                // The session task is gone; drop the connection.
                self.registry.remove(id);
                report.failed += 1;
                tracing::warn!(connection_id = %id, kind = ?event.kind(), "broadcast delivery failure");
            }
        }
        report
    }
}
