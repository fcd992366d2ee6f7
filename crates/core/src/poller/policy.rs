//! Retry policy for the progress poller.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How often to poll a job and when to give up on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total status requests before the job is declared timed out.
    pub max_attempts: u32,
    /// Transport failures in a row before the connection is declared lost.
    pub max_consecutive_transport_failures: u32,
    /// Delay between successive polls (milliseconds).
    pub poll_interval_ms: u64,
    /// Delay between submission and the first poll (milliseconds).
    pub initial_delay_ms: u64,
}

impl RetryPolicy {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Upper bound on how long polling can take, ignoring request latency.
    pub fn worst_case_duration(&self) -> Duration {
        let waits = u64::from(self.max_attempts.saturating_sub(1));
        self.initial_delay() + self.poll_interval() * waits as u32
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 120,
            max_consecutive_transport_failures: 3,
            poll_interval_ms: 2000,
            initial_delay_ms: 1000,
        }
    }
}
