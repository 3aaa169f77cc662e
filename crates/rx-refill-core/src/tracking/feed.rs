//! Reconnect policy for live tracking subscribers.
//!
//! ```text
//!            connected
//!   Live ◄─────────────── Live (backing off)
//!    │  disconnect            │ failures ≥ max
//!    ▼                        ▼
//!  Reconnect(delay)        Polling ── "Live updates unavailable"
//! ```

use std::time::Duration;

/// Message shown once a feed has fallen back to polling.
pub const LIVE_UPDATES_UNAVAILABLE: &str = "Live updates unavailable";

/// Backoff and degradation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Consecutive failures before switching to polling
    pub max_failures: u32,
    pub poll_interval: Duration,
}

impl Default for FeedPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_failures: 5,
            poll_interval: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    Live,
    Polling,
}

/// What the client should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedAction {
    Reconnect(Duration),
    Poll(Duration),
}

/// Per-subscription connection supervisor.
#[derive(Debug, Clone)]
pub struct LiveFeed {
    policy: FeedPolicy,
    failures: u32,
    mode: FeedMode,
}

impl LiveFeed {
    pub fn new(policy: FeedPolicy) -> Self {
        Self {
            policy,
            failures: 0,
            mode: FeedMode::Live,
        }
    }

    pub fn mode(&self) -> FeedMode {
        self.mode
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    /// A stream opened successfully; resets the backoff.
    pub fn on_connected(&mut self) {
        self.failures = 0;
        self.mode = FeedMode::Live;
    }

    /// The stream failed or closed.
    pub fn on_disconnected(&mut self) -> FeedAction {
        self.failures = self.failures.saturating_add(1);

        if self.failures >= self.policy.max_failures {
            self.mode = FeedMode::Polling;
        }

        match self.mode {
            FeedMode::Polling => FeedAction::Poll(self.policy.poll_interval),
            FeedMode::Live => FeedAction::Reconnect(self.backoff()),
        }
    }

    /// Status line for the client, if any.
    pub fn status_message(&self) -> Option<&'static str> {
        match self.mode {
            FeedMode::Polling => Some(LIVE_UPDATES_UNAVAILABLE),
            FeedMode::Live => None,
        }
    }

    fn backoff(&self) -> Duration {
        let exponent = self.failures.saturating_sub(1).min(16);
        self.policy
            .initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.policy.max_delay)
    }
}

impl Default for LiveFeed {
    fn default() -> Self {
        Self::new(FeedPolicy::default())
    }
}
