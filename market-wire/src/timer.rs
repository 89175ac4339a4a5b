//! Retransmit timer for the stop-and-wait channel.
//!
//! Unlike an adaptive TCP timer, the channel uses one fixed timeout for every
//! attempt: no RTT estimation, no exponential back-off, no retry cap.  A
//! [`RetransmitTimer`] is armed on each (re)transmission and reports how much
//! of the current wait is left, so a receive can be bounded by
//! `tokio::time::timeout(timer.remaining(), ..)` instead of polling a clock.

use std::time::Duration;

use tokio::time::Instant;

/// Timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Adjustable timeout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// How long to wait for a reply before retransmitting.
    pub timeout: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Deadline of the current attempt.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    timeout: Duration,
    deadline: Instant,
}

impl RetransmitTimer {
    /// Create a timer already armed from now.
    pub fn new(config: TimerConfig) -> Self {
        Self {
            timeout: config.timeout,
            deadline: Instant::now() + config.timeout,
        }
    }

    /// Restart the full timeout from now.
    pub fn arm(&mut self) {
        self.deadline = Instant::now() + self.timeout;
    }

    /// Time left before the current attempt expires (zero once expired).
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
