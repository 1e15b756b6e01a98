//! Realtime fan-out to connected displays.
//!
//! Each connection owns an unbounded outbound queue drained by its own
//! session task, so a broadcast is an O(N) enqueue that never waits on a
//! client. Ordering is preserved per connection only.

pub mod broadcaster;
pub mod connection;
pub mod heartbeat;
pub mod registry;

pub use broadcaster::RealtimeBroadcaster;
pub use connection::{ConnectionEvent, ConnectionState};
pub use heartbeat::{Heartbeat, HeartbeatAction};
pub use registry::{ConnectionRegistry, InMemoryConnectionRegistry, Outbound, OutboundSender};
