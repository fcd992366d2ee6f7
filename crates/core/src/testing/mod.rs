//! Testing utilities and mock implementations.
//!
//! [`MockConversionService`] scripts the remote service so lifecycle tests
//! run without a network, and [`RecordingNotifier`] captures what the user
//! would have been told.
//!
//! # Example
//!
//! ```rust,ignore
//! use transmute_core::testing::{MockConversionService, RecordingNotifier};
//!
//! let service = Arc::new(MockConversionService::new());
//! service.fail_submit("broken.wav", SubmitError::rejected(400, None)).await;
//!
//! let notifier = Arc::new(RecordingNotifier::new());
//! // Build a ConversionOrchestrator with both...
//! ```

mod mock_service;
mod recording_notifier;

pub use mock_service::{MockConversionService, RecordedSubmit};
pub use recording_notifier::RecordingNotifier;

/// Test fixtures and helper functions.
pub mod fixtures {
    use reqwest::Url;

    use crate::converter::ConverterKind;
    use crate::orchestrator::OrchestratorConfig;
    use crate::poller::RetryPolicy;
    use crate::validator::CandidateFile;

    /// Base URL used by fixture configurations.
    pub const BASE_URL: &str = "https://convert.example.com";

    /// A candidate file of `size` zero bytes.
    pub fn candidate(name: &str, size: usize) -> CandidateFile {
        CandidateFile::new(name, vec![0u8; size])
    }

    /// A retry policy with short delays, for paused-clock tests.
    pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            max_consecutive_transport_failures: 3,
            poll_interval_ms: 100,
            initial_delay_ms: 50,
        }
    }

    /// Orchestrator settings for `kind` using [`fast_policy`].
    pub fn orchestrator_config(kind: ConverterKind, max_attempts: u32) -> OrchestratorConfig {
        let base = Url::parse(BASE_URL).expect("fixture URL is valid");
        OrchestratorConfig::for_kind(kind, base).with_policy(fast_policy(max_attempts))
    }
}
