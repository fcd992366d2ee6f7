pub mod config;
pub mod converter;
pub mod download;
pub mod file;
pub mod metrics;
pub mod notify;
pub mod orchestrator;
pub mod poller;
pub mod service;
pub mod submitter;
pub mod testing;
pub mod validator;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use converter::{ConversionParams, ConverterKind};
pub use download::{Artifact, DownloadError, DownloadResolver, ResolvedArtifact};
pub use file::{FailureKind, FileId, FileStatus, FileView, JobId, ManagedFile};
pub use notify::{
    ChannelNotifier, CompositeNotifier, Notification, NotificationSink, Severity, TracingNotifier,
};
pub use orchestrator::{
    BatchReport, ClaimedBatch, ConversionOrchestrator, DropOutcome, OrchestratorConfig, OrchestratorError,
    QueueEvent,
};
pub use poller::{PollEvent, ProgressPoller, RetryPolicy};
pub use service::{ConversionService, HttpConversionService, SubmitError, TransportError};
pub use submitter::JobSubmitter;
pub use validator::{validate, CandidateFile, Rejection, ValidationRules};
