//! Listener connection state machine
//!
//! Connected -> Reconnecting{attempt} on every failure, back to Connected on
//! the next successful poll, and Failed once the consecutive-failure budget
//! is spent. Delays grow exponentially from `initial` up to `max`.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::config::ListenerConfig;

/// Listener connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    Reconnecting { attempt: u32 },
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "CONNECTED"),
            Self::Reconnecting { attempt } => write!(f, "RECONNECTING({})", attempt),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    /// Consecutive failures tolerated before giving up
    pub max_attempts: u32,
}

impl BackoffPolicy {
    /// Delay before reconnect attempt `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial
            .checked_mul(1 << shift)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

impl From<&ListenerConfig> for BackoffPolicy {
    fn from(config: &ListenerConfig) -> Self {
        Self {
            initial: Duration::from_millis(config.reconnect_initial_ms),
            max: Duration::from_millis(config.reconnect_max_ms),
            max_attempts: config.max_reconnect_attempts,
        }
    }
}

/// Drives `ConnectionState` transitions
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    policy: BackoffPolicy,
}

impl ConnectionMachine {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            state: ConnectionState::Connected,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// A poll succeeded
    pub fn on_success(&mut self) {
        if self.state != ConnectionState::Failed {
            self.state = ConnectionState::Connected;
        }
    }

    /// A poll failed; returns the delay before retrying, or `None` once Failed
    pub fn on_failure(&mut self) -> Option<Duration> {
        let attempt = match self.state {
            ConnectionState::Connected => 1,
            ConnectionState::Reconnecting { attempt } => attempt + 1,
            ConnectionState::Failed => return None,
        };

        if attempt > self.policy.max_attempts {
            self.state = ConnectionState::Failed;
            return None;
        }

        self.state = ConnectionState::Reconnecting { attempt };
        Some(self.policy.delay(attempt))
    }
}
