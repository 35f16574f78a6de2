// Per-item countdown handling.

use std::time::Duration;
use tokio::time::Instant;

/// The bidding countdown for the item on the block.
///
/// The timer holds a deadline rather than a running task: the event loop
/// copies the deadline into its `select!` each iteration, so rearming or
/// disarming takes effect on the next pass without cancellation plumbing.
#[derive(Debug, Clone, Copy)]
pub struct RoundTimer {
    enabled: bool,
    duration: Duration,
    deadline: Option<Instant>,
}

impl RoundTimer {
    pub fn new(enabled: bool, duration: Duration) -> Self {
        Self {
            enabled,
            duration,
            deadline: None,
        }
    }

    /// Restart the countdown from now. No-op when the timer is disabled.
    pub fn arm(&mut self) {
        if self.enabled {
            self.deadline = Some(Instant::now() + self.duration);
        }
    }

    /// Stop the countdown.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left on the countdown, `None` when not armed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

/// Sleep until the deadline, or forever when there is none.
pub async fn countdown(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
