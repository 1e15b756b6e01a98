//! In-memory broadcaster for tests/dev.

use std::sync::Mutex;

use pourline_core::ConnectionId;

use crate::broadcaster::{BroadcastReport, Broadcaster};
use crate::event::RealtimeEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    pub event: RealtimeEvent,
    pub origin: Option<ConnectionId>,
}

/// Records every broadcast instead of delivering it.
#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    sent: Mutex<Vec<Broadcast>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broadcasts(&self) -> Vec<Broadcast> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn broadcast(&self, event: &RealtimeEvent, origin: Option<ConnectionId>) -> BroadcastReport {
        // A poisoned lock only loses the recording.
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(Broadcast { event: event.clone(), origin });
        }
        BroadcastReport { delivered: 1, ..BroadcastReport::default() }
    }
}
