/// Lifecycle of one realtime connection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Open,
    Closing,
    Closed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Handshake finished and the greeting was sent.
    Opened,
    /// Either side asked to close, or the heartbeat declared it dead.
    CloseRequested,
    /// The transport is gone.
    TransportClosed,
}

impl ConnectionState {
    pub fn on(self, event: ConnectionEvent) -> Self {
        use ConnectionEvent::*;
        use ConnectionState::*;
        match (self, event) {
            (_, TransportClosed) => Closed,
            (Connecting, Opened) => Open,
            (Connecting | Open, CloseRequested) => Closing,
            (state, _) => state,
        }
    }

    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}
