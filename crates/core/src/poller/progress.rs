//! Poll loop implementation.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::converter::{ConverterKind, EndpointDescriptor};
use crate::file::{FailureKind, JobId, JobStatusSnapshot};
use crate::metrics;
use crate::service::{ConversionService, TransportError};

use super::policy::RetryPolicy;

const TIMED_OUT_MESSAGE: &str = "timed out waiting for conversion";
const LOST_CONNECTION_MESSAGE: &str = "lost connection to conversion service";

/// The two independent counters of a poll loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollCounters {
    /// Status requests issued so far.
    pub attempts: u32,
    /// Transport failures in a row. Any successful response resets it.
    pub consecutive_transport_failures: u32,
}

/// Why the poller stopped without a terminal snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollFailure {
    /// Attempt ceiling reached while the job was still running.
    TimedOut { attempts: u32 },
    /// Too many transport failures in a row.
    LostConnection {
        consecutive_failures: u32,
        last_error: TransportError,
    },
}

impl PollFailure {
    /// Message recorded on the file.
    pub fn message(&self) -> &'static str {
        match self {
            Self::TimedOut { .. } => TIMED_OUT_MESSAGE,
            Self::LostConnection { .. } => LOST_CONNECTION_MESSAGE,
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::TimedOut { .. } => FailureKind::TimedOut,
            Self::LostConnection { .. } => FailureKind::LostConnection,
        }
    }
}

/// One step of a poll loop.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// The service answered. Ends the stream if the snapshot is terminal.
    Snapshot {
        snapshot: JobStatusSnapshot,
        counters: PollCounters,
    },
    /// A poll failed but the failure budget is not spent yet.
    TransportFailure {
        error: TransportError,
        counters: PollCounters,
    },
    /// The poller gave up. Always the last event.
    GaveUp {
        failure: PollFailure,
        counters: PollCounters,
    },
}

impl PollEvent {
    pub fn counters(&self) -> PollCounters {
        match self {
            Self::Snapshot { counters, .. }
            | Self::TransportFailure { counters, .. }
            | Self::GaveUp { counters, .. } => *counters,
        }
    }

    /// Whether no further events follow this one.
    pub fn is_final(&self) -> bool {
        match self {
            Self::Snapshot { snapshot, .. } => snapshot.status.is_terminal(),
            Self::TransportFailure { .. } => false,
            Self::GaveUp { .. } => true,
        }
    }
}

/// Polls job status for one converter kind.
pub struct ProgressPoller<S: ?Sized> {
    service: Arc<S>,
    kind: ConverterKind,
    endpoint: EndpointDescriptor,
    policy: RetryPolicy,
}

impl<S: ?Sized> Clone for ProgressPoller<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            kind: self.kind,
            endpoint: self.endpoint,
            policy: self.policy,
        }
    }
}

struct LoopState<S: ?Sized> {
    poller: ProgressPoller<S>,
    job_id: JobId,
    counters: PollCounters,
    finished: bool,
}

impl<S> ProgressPoller<S>
where
    S: ConversionService + ?Sized + 'static,
{
    pub fn new(service: Arc<S>, kind: ConverterKind, policy: RetryPolicy) -> Self {
        Self {
            service,
            kind,
            endpoint: kind.endpoint(),
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Start polling `job_id`.
    ///
    /// Nothing happens until the stream is polled. The first request goes
    /// out after the policy's initial delay, later ones after each interval.
    /// Dropping the stream abandons the loop; the remote job is not told.
    pub fn poll(&self, job_id: JobId) -> BoxStream<'static, PollEvent> {
        let state = LoopState {
            poller: self.clone(),
            job_id,
            counters: PollCounters::default(),
            finished: false,
        };

        stream::unfold(state, |mut state| async move {
            if state.finished {
                return None;
            }
            let event = state.step().await;
            state.finished = event.is_final();
            Some((event, state))
        })
        .boxed()
    }
}

impl<S> LoopState<S>
where
    S: ConversionService + ?Sized + 'static,
{
    async fn step(&mut self) -> PollEvent {
        let policy = self.poller.policy;
        let kind = self.poller.kind.as_str();

        if self.counters.attempts >= policy.max_attempts {
            warn!(
                kind,
                job_id = %self.job_id,
                attempts = self.counters.attempts,
                "Giving up on job: attempt ceiling reached"
            );
            return PollEvent::GaveUp {
                failure: PollFailure::TimedOut {
                    attempts: self.counters.attempts,
                },
                counters: self.counters,
            };
        }

        let delay = if self.counters.attempts == 0 {
            policy.initial_delay()
        } else {
            policy.poll_interval()
        };
        tokio::time::sleep(delay).await;

        self.counters.attempts += 1;
        let result = self
            .poller
            .service
            .poll_status(&self.poller.endpoint, &self.job_id)
            .await;

        match result {
            Ok(snapshot) => {
                metrics::POLLS_TOTAL.with_label_values(&[kind, "ok"]).inc();
                self.counters.consecutive_transport_failures = 0;
                debug!(
                    kind,
                    job_id = %self.job_id,
                    attempt = self.counters.attempts,
                    status = %snapshot.status,
                    progress = snapshot.progress_percent,
                    "Polled job status"
                );
                if snapshot.status.is_terminal() {
                    info!(
                        kind,
                        job_id = %self.job_id,
                        attempts = self.counters.attempts,
                        status = %snapshot.status,
                        "Job reached terminal state"
                    );
                }
                PollEvent::Snapshot {
                    snapshot,
                    counters: self.counters,
                }
            }
            Err(error) => {
                metrics::POLLS_TOTAL
                    .with_label_values(&[kind, error.code()])
                    .inc();
                self.counters.consecutive_transport_failures += 1;

                if self.counters.consecutive_transport_failures
                    >= policy.max_consecutive_transport_failures
                {
                    warn!(
                        kind,
                        job_id = %self.job_id,
                        failures = self.counters.consecutive_transport_failures,
                        error = %error,
                        "Giving up on job: lost connection"
                    );
                    PollEvent::GaveUp {
                        failure: PollFailure::LostConnection {
                            consecutive_failures: self.counters.consecutive_transport_failures,
                            last_error: error,
                        },
                        counters: self.counters,
                    }
                } else {
                    debug!(
                        kind,
                        job_id = %self.job_id,
                        attempt = self.counters.attempts,
                        failures = self.counters.consecutive_transport_failures,
                        error = %error,
                        "Status poll failed, will retry"
                    );
                    PollEvent::TransportFailure {
                        error,
                        counters: self.counters,
                    }
                }
            }
        }
    }
}
