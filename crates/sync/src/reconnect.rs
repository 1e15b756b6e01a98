//! Client reconnect schedule for the realtime channel.
//!
//! Backoff starts at 1s and doubles up to a 10s cap. After the last attempt
//! the client stops and shows a manual refresh affordance.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the `attempt`-th reconnect (1-based), or `None` once the
    /// attempts are used up.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        Some(self.initial_delay.saturating_mul(factor).min(self.max_delay))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    Connected,
    Reconnecting,
    /// Automatic reconnects are exhausted.
    ManualRefreshRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectStep {
    /// Wait, then try attempt number `attempt`.
    Retry { attempt: u32, delay: Duration },
    ManualRefreshRequired,
}

/// Tracks reconnect attempts for one realtime channel.
#[derive(Debug, Clone)]
pub struct Reconnector {
    policy: ReconnectPolicy,
    attempts: u32,
    state: ConnectivityState,
}

impl Reconnector {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempts: 0, state: ConnectivityState::Connected }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// The connection dropped or a reconnect attempt failed.
    pub fn on_disconnect(&mut self) -> ReconnectStep {
        self.attempts = self.attempts.saturating_add(1);
        match self.policy.delay_for(self.attempts) {
            Some(delay) => {
                self.state = ConnectivityState::Reconnecting;
                tracing::debug!(attempt = self.attempts, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
                ReconnectStep::Retry { attempt: self.attempts, delay }
            }
            None => {
                if self.state != ConnectivityState::ManualRefreshRequired {
                    tracing::warn!(attempts = self.policy.max_attempts, "reconnect attempts exhausted");
                }
                self.state = ConnectivityState::ManualRefreshRequired;
                ReconnectStep::ManualRefreshRequired
            }
        }
    }

    /// A connection (automatic or manual) succeeded. The caller should
    /// refetch the catalog, since broadcasts sent while away are lost.
    pub fn on_connected(&mut self) {
        self.attempts = 0;
        self.state = ConnectivityState::Connected;
    }
}

impl Default for Reconnector {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}
