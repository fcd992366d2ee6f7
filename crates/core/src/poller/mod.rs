//! Progress polling for submitted jobs.
//!
//! A [`ProgressPoller`] turns a job id into a stream of [`PollEvent`]s. The
//! stream ends on the first terminal snapshot, or with a [`PollEvent::GaveUp`]
//! once either budget of the [`RetryPolicy`] is spent.

mod policy;
mod progress;

pub use policy::RetryPolicy;
pub use progress::{PollCounters, PollEvent, PollFailure, ProgressPoller};
