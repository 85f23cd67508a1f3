//! Connection liveness tracking

use std::time::{Duration, Instant};

/// Advertised intervals at or below this are ignored
pub const MIN_ADVERTISED_INTERVAL: Duration = Duration::from_secs(2);

/// Liveness clock of one connection
///
/// A connection is dead once nothing has answered a probe for 1.5 intervals.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    interval: Duration,
    last_seen: Instant,
}

impl Heartbeat {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last_seen: now,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Record a liveness response (or a fresh open)
    pub fn record(&mut self, now: Instant) {
        self.last_seen = now;
    }

    /// Time allowed without a response
    pub fn timeout(&self) -> Duration {
        self.interval * 3 / 2
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_seen) > self.timeout()
    }

    /// Adopt a server-advertised interval if it is shorter and plausible
    pub fn narrow(&mut self, advertised: Duration) -> bool {
        if advertised > MIN_ADVERTISED_INTERVAL && advertised < self.interval {
            self.interval = advertised;
            true
        } else {
            false
        }
    }
}
