//! Realtime events and their wire envelope.

pub mod broadcaster;
pub mod envelope;
pub mod event;
pub mod recording;

pub use broadcaster::{BroadcastReport, Broadcaster};
pub use envelope::{Envelope, EnvelopeKind};
pub use event::{RealtimeEvent, StockLevel};
pub use recording::{Broadcast, RecordingBroadcaster};
