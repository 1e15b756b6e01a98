//! Ping/pong liveness check for one connection.
//!
//! The server pings on every tick. If the pong for the previous ping has not
//! arrived by the next tick, the connection is dead.

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HeartbeatAction {
    SendPing,
    Terminate,
}

#[derive(Debug, Default, Clone)]
pub struct Heartbeat {
    awaiting_pong: bool,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_tick(&mut self) -> HeartbeatAction {
        if self.awaiting_pong {
            return HeartbeatAction::Terminate;
        }
        self.awaiting_pong = true;
        HeartbeatAction::SendPing
    }

    pub fn on_pong(&mut self) {
        self.awaiting_pong = false;
    }

    pub fn awaiting_pong(&self) -> bool {
        self.awaiting_pong
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answered_pings_keep_the_connection_alive() {
        let mut hb = Heartbeat::new();
        for _ in 0..5 {
            assert_eq!(hb.on_tick(), HeartbeatAction::SendPing);
            hb.on_pong();
        }
    }

    #[test]
    fn missing_pong_terminates_on_the_next_tick() {
        let mut hb = Heartbeat::new();
        assert_eq!(hb.on_tick(), HeartbeatAction::SendPing);
        assert!(hb.awaiting_pong());
        assert_eq!(hb.on_tick(), HeartbeatAction::Terminate);
    }
}
