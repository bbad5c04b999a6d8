//! Rate limiter for operator warnings

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct WarningLimiter {
    interval: Duration,
    last_emitted: Option<Instant>,
    suppressed: u64,
    emitted: u64,
}

impl WarningLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emitted: None,
            suppressed: 0,
            emitted: 0,
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// True when a warning may be shown at `now`
    pub fn allow(&mut self, now: Instant) -> bool {
        let open = self
            .last_emitted
            .map_or(true, |at| now.saturating_duration_since(at) >= self.interval);
        if open {
            self.last_emitted = Some(now);
            self.emitted += 1;
        } else {
            self.suppressed += 1;
        }
        open
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}
