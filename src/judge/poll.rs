//! Suspend-then-check pacing for verdict polling.
//!
//! Backends poll in a plain loop and call [`PollSchedule::wait`] between
//! checks:
//!
//! ```text
//! let mut schedule = PollSchedule::new(interval, timeout);
//! loop {
//!     if let Some(verdict) = check(session).await? {
//!         return Ok(verdict);
//!     }
//!     schedule.wait().await?;
//! }
//! ```
//!
//! Each wait is a timer sleep, so a slow remote judge never spins the
//! scheduler, and the deadline is fixed when the schedule is created.

use std::time::Duration;

use tokio::time::Instant;

use super::{BackendError, BackendResult};

/// Fixed-interval polling with an overall deadline.
#[derive(Debug)]
pub struct PollSchedule {
    interval: Duration,
    timeout: Duration,
    deadline: Instant,
    attempts: u32,
}

impl PollSchedule {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            deadline: Instant::now() + timeout,
            attempts: 0,
        }
    }

    /// Sleep until the next check is due.
    ///
    /// Fails with [`BackendError::Timeout`] once the deadline has passed.
    /// The last sleep is clipped so it never overshoots the deadline.
    pub async fn wait(&mut self) -> BackendResult<()> {
        let now = Instant::now();
        if now >= self.deadline {
            return Err(BackendError::Timeout(self.timeout));
        }
        let remaining = self.deadline - now;
        tokio::time::sleep(self.interval.min(remaining)).await;
        self.attempts += 1;
        Ok(())
    }

    /// Number of completed waits.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
