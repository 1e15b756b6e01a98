use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;

use pourline_core::ConnectionId;

/// One serialized envelope, shared by every connection it is sent to.
pub type Outbound = Arc<str>;

pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

/// The set of open connections a broadcaster fans out to.
pub trait ConnectionRegistry: Send + Sync {
    fn register(&self, id: ConnectionId, sender: OutboundSender);

    /// Returns whether the connection was registered.
    fn remove(&self, id: ConnectionId) -> bool;

    /// Point-in-time copy of the open connections.
    fn snapshot(&self) -> Vec<(ConnectionId, OutboundSender)>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R> ConnectionRegistry for Arc<R>
where
    R: ConnectionRegistry + ?Sized,
{
    fn register(&self, id: ConnectionId, sender: OutboundSender) {
        (**self).register(id, sender)
    }

    fn remove(&self, id: ConnectionId) -> bool {
        (**self).remove(id)
    }

    fn snapshot(&self) -> Vec<(ConnectionId, OutboundSender)> {
        (**self).snapshot()
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, OutboundSender>>,
}

impl InMemoryConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConnectionRegistry for InMemoryConnectionRegistry {
    fn register(&self, id: ConnectionId, sender: OutboundSender) {
        // A poisoned lock still holds a usable map.
        let mut map = self.connections.write().unwrap_or_else(|e| e.into_inner());
        map.insert(id, sender);
    }

    fn remove(&self, id: ConnectionId) -> bool {
        let mut map = self.connections.write().unwrap_or_else(|e| e.into_inner());
        map.remove(&id).is_some()
    }

    fn snapshot(&self) -> Vec<(ConnectionId, OutboundSender)> {
        let map = self.connections.read().unwrap_or_else(|e| e.into_inner());
        map.iter().map(|(id, tx)| (*id, tx.clone())).collect()
    }

    fn len(&self) -> usize {
        self.connections.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_remove_track_membership() {
        let registry = InMemoryConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = ConnectionId::new();

        registry.register(id, tx);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot()[0].0, id);

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert!(registry.is_empty());
    }
}
