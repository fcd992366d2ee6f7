//! Conversion orchestrator implementation.
//!
//! Drives each queued file through submit, poll and a terminal state:
//! - Files within a batch run one at a time, each in its own task
//! - A failing or crashing file never stops the rest of the batch
//! - Concurrent batches are independent; each claims its files up front

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::converter::{ConversionParams, ConverterKind};
use crate::download::{Artifact, DownloadResolver, ResolvedArtifact};
use crate::file::{FailureKind, FileId, FileStatus, FileView, ManagedFile};
use crate::metrics;
use crate::notify::{Notification, NotificationSink, Severity};
use crate::poller::{PollEvent, ProgressPoller};
use crate::service::ConversionService;
use crate::submitter::JobSubmitter;
use crate::validator::{partition, CandidateFile, ValidationRules};

use super::config::OrchestratorConfig;
use super::queue::FileQueue;
use super::types::{BatchReport, ClaimedBatch, DropOutcome, OrchestratorError, QueueEvent};

const TASK_CRASHED: &str = "internal error while converting file";

/// Owns the file queue of one converter kind and drives its files.
pub struct ConversionOrchestrator<S: ?Sized> {
    kind: ConverterKind,
    rules: ValidationRules,
    queue: Arc<FileQueue>,
    lifecycle: FileLifecycle<S>,
    resolver: DownloadResolver<S>,
}

impl<S> ConversionOrchestrator<S>
where
    S: ConversionService + ?Sized + 'static,
{
    /// Create an orchestrator with an empty queue.
    pub fn new(
        config: OrchestratorConfig,
        service: Arc<S>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let kind = config.kind;
        let queue = Arc::new(FileQueue::new(kind, config.event_capacity));

        let lifecycle = FileLifecycle {
            kind,
            queue: Arc::clone(&queue),
            submitter: JobSubmitter::new(Arc::clone(&service), kind),
            poller: ProgressPoller::new(Arc::clone(&service), kind, config.policy),
            notifier,
        };

        Self {
            kind,
            rules: config.rules,
            queue,
            lifecycle,
            resolver: DownloadResolver::new(service, config.download_base_url),
        }
    }

    pub fn kind(&self) -> ConverterKind {
        self.kind
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    pub fn queue(&self) -> &Arc<FileQueue> {
        &self.queue
    }

    /// Subscribe to queue changes.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<QueueEvent> {
        self.queue.subscribe()
    }

    /// Read-only projection of every queued file, in queue order.
    pub async fn files(&self) -> Vec<FileView> {
        self.queue.list().await
    }

    pub async fn file(&self, id: FileId) -> Option<FileView> {
        self.queue.get(id).await.map(|f| f.view())
    }

    /// Validate dropped files and queue the ones that pass.
    ///
    /// All rejections are reported in a single notification.
    pub async fn on_files_dropped(&self, files: Vec<CandidateFile>) -> DropOutcome {
        let split = partition(files, &self.rules);

        for rejected in &split.rejected {
            metrics::VALIDATION_REJECTIONS
                .with_label_values(&[self.kind.as_str(), rejected.reason.code()])
                .inc();
            debug!(kind = %self.kind, name = %rejected.name, reason = %rejected.reason, "File rejected");
        }
        if let Some(summary) = split.rejection_summary() {
            self.lifecycle
                .notifier
                .notify(Notification::new(Severity::Warning, summary));
        }

        let mut accepted = Vec::with_capacity(split.accepted.len());
        for candidate in split.accepted {
            accepted.push(self.queue.insert(ManagedFile::new(candidate)).await);
        }

        info!(
            kind = %self.kind,
            accepted = accepted.len(),
            rejected = split.rejected.len(),
            "Files dropped"
        );

        DropOutcome {
            accepted,
            rejected: split.rejected,
        }
    }

    /// Remove one pending or errored file. Anything else is refused and left
    /// untouched.
    pub async fn remove_file(&self, id: FileId) -> Result<(), OrchestratorError> {
        self.queue.remove(id).await.map(|_| ())
    }

    /// Remove every file without a job in flight. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let removed = self.queue.clear().await;
        info!(kind = %self.kind, removed = removed.len(), "Queue cleared");
        removed.len()
    }

    /// Claim all currently pending files for a new batch.
    pub async fn claim_batch(&self) -> ClaimedBatch {
        ClaimedBatch {
            batch_id: Uuid::new_v4(),
            file_ids: self.queue.claim_pending().await,
        }
    }

    /// Process every currently pending file. Never fails; per-file errors
    /// are recorded on the file.
    pub async fn run_batch(&self, params: ConversionParams) -> BatchReport {
        let batch = self.claim_batch().await;
        self.run_claimed(batch, params).await
    }

    /// Process a batch claimed by [`claim_batch`](Self::claim_batch).
    pub async fn run_claimed(&self, batch: ClaimedBatch, params: ConversionParams) -> BatchReport {
        let started_at = Utc::now();
        let mut report = BatchReport {
            batch_id: batch.batch_id,
            kind: self.kind,
            completed: Vec::new(),
            failed: Vec::new(),
            started_at,
            finished_at: started_at,
        };

        info!(
            kind = %self.kind,
            batch_id = %batch.batch_id,
            files = batch.file_ids.len(),
            "Starting batch"
        );
        self.queue.publish(QueueEvent::BatchStarted {
            kind: self.kind,
            batch_id: batch.batch_id,
            file_ids: batch.file_ids.clone(),
        });

        for file_id in batch.file_ids {
            let lifecycle = self.lifecycle.clone();
            let file_params = params.clone();
            let handle = tokio::spawn(async move { lifecycle.run(file_id, file_params).await });

            if let Err(e) = handle.await {
                error!(
                    kind = %self.kind,
                    file_id = %file_id,
                    error = %e,
                    "File lifecycle task crashed"
                );
                self.lifecycle
                    .fail(file_id, FailureKind::Internal, TASK_CRASHED.to_string())
                    .await;
            }
            self.queue.release(file_id).await;

            match self.queue.get(file_id).await.map(|f| f.status()) {
                Some(FileStatus::Completed) => report.completed.push(file_id),
                Some(FileStatus::Error) => report.failed.push(file_id),
                Some(status) => {
                    warn!(file_id = %file_id, status = %status, "File left batch without a terminal state");
                    report.failed.push(file_id);
                }
                None => warn!(file_id = %file_id, "File disappeared during batch"),
            }
        }

        report.finished_at = Utc::now();
        let elapsed = report.finished_at - report.started_at;
        metrics::BATCH_DURATION
            .with_label_values(&[self.kind.as_str()])
            .observe(elapsed.num_milliseconds() as f64 / 1000.0);
        info!(
            kind = %self.kind,
            batch_id = %report.batch_id,
            completed = report.completed.len(),
            failed = report.failed.len(),
            "Batch finished"
        );
        self.queue.publish(QueueEvent::BatchFinished {
            kind: self.kind,
            report: report.clone(),
        });

        report
    }

    /// Resolve a completed file's artifact to a URL without fetching it.
    pub async fn resolve_artifact(&self, id: FileId) -> Result<ResolvedArtifact, OrchestratorError> {
        let file = self.queue.get(id).await.ok_or(OrchestratorError::NotFound(id))?;
        Ok(self.resolver.resolve(&file)?)
    }

    /// Fetch a completed file's artifact.
    pub async fn fetch_artifact(&self, id: FileId) -> Result<Artifact, OrchestratorError> {
        let file = self.queue.get(id).await.ok_or(OrchestratorError::NotFound(id))?;
        Ok(self.resolver.fetch(&file).await?)
    }
}

/// Everything one file's lifecycle task needs, cheap to clone.
struct FileLifecycle<S: ?Sized> {
    kind: ConverterKind,
    queue: Arc<FileQueue>,
    submitter: JobSubmitter<S>,
    poller: ProgressPoller<S>,
    notifier: Arc<dyn NotificationSink>,
}

impl<S: ?Sized> Clone for FileLifecycle<S> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            queue: Arc::clone(&self.queue),
            submitter: self.submitter.clone(),
            poller: self.poller.clone(),
            notifier: Arc::clone(&self.notifier),
        }
    }
}

impl<S> FileLifecycle<S>
where
    S: ConversionService + ?Sized + 'static,
{
    /// Submit one pending file and poll it to a terminal state.
    async fn run(&self, file_id: FileId, params: ConversionParams) {
        let file = match self.queue.get(file_id).await {
            Some(file) if file.status() == FileStatus::Pending => file,
            Some(file) => {
                warn!(file_id = %file_id, status = %file.status(), "Skipping file that is not pending");
                return;
            }
            None => {
                warn!(file_id = %file_id, "Skipping file that is no longer queued");
                return;
            }
        };

        let job_id = match self.submitter.submit(&file, &params).await {
            Ok(job_id) => job_id,
            Err(e) => {
                self.fail(file_id, FailureKind::Submit, e.to_string()).await;
                return;
            }
        };

        let submitted = job_id.clone();
        if let Err(e) = self
            .queue
            .update(file_id, move |f| f.mark_submitted(submitted))
            .await
        {
            error!(file_id = %file_id, job_id = %job_id, error = %e, "Failed to record submission");
            return;
        }

        let mut events = self.poller.poll(job_id);
        while let Some(event) = events.next().await {
            match event {
                PollEvent::Snapshot { snapshot, .. } => {
                    match self.queue.update(file_id, |f| f.apply_snapshot(&snapshot)).await {
                        Ok(updated) if updated.status().is_terminal() => {
                            self.finished(&updated);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!(file_id = %file_id, error = %e, "Failed to apply poll snapshot");
                            return;
                        }
                    }
                }
                PollEvent::TransportFailure { .. } => {}
                PollEvent::GaveUp { failure, .. } => {
                    self.fail(file_id, failure.failure_kind(), failure.message().to_string())
                        .await;
                }
            }
        }
    }

    /// Move a file to `error` and report it. Files already terminal are left alone.
    async fn fail(&self, file_id: FileId, failure: FailureKind, detail: String) {
        match self
            .queue
            .update(file_id, |f| f.mark_failed(failure, detail))
            .await
        {
            Ok(updated) => self.finished(&updated),
            Err(e) => debug!(file_id = %file_id, error = %e, "Not marking file as failed"),
        }
    }

    fn finished(&self, file: &ManagedFile) {
        let (outcome, notification) = match file.status() {
            FileStatus::Completed => (
                "completed",
                Notification::new(
                    Severity::Success,
                    format!("{} converted successfully", file.name()),
                ),
            ),
            _ => (
                file.failure().map(|f| f.as_str()).unwrap_or("error"),
                Notification::new(
                    Severity::Error,
                    format!(
                        "{}: {}",
                        file.name(),
                        file.error_detail().unwrap_or("conversion failed")
                    ),
                ),
            ),
        };

        metrics::FILES_TERMINAL
            .with_label_values(&[self.kind.as_str(), outcome])
            .inc();
        info!(
            kind = %self.kind,
            file_id = %file.id(),
            outcome,
            "File reached terminal state"
        );
        self.notifier.notify(notification.for_file(file.id()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;

    use crate::file::{JobStatusSnapshot, SUBMITTED_PROGRESS};
    use crate::poller::RetryPolicy;
    use crate::service::{SubmitError, TransportError};
    use crate::testing::{MockConversionService, RecordingNotifier};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            max_consecutive_transport_failures: 3,
            poll_interval_ms: 100,
            initial_delay_ms: 50,
        }
    }

    fn setup() -> (
        ConversionOrchestrator<MockConversionService>,
        Arc<MockConversionService>,
        Arc<RecordingNotifier>,
    ) {
        let service = Arc::new(MockConversionService::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let config = OrchestratorConfig::for_kind(
            ConverterKind::Audio,
            Url::parse("https://convert.example.com").unwrap(),
        )
        .with_policy(fast_policy());
        let orchestrator =
            ConversionOrchestrator::new(config, Arc::clone(&service), notifier.clone());
        (orchestrator, service, notifier)
    }

    fn params() -> ConversionParams {
        ConversionParams::default().with_target_format("mp3")
    }

    #[tokio::test]
    async fn test_drop_partitions_and_aggregates_rejections() {
        let (orchestrator, _, notifier) = setup();

        let outcome = orchestrator
            .on_files_dropped(vec![
                CandidateFile::new("a.wav", vec![0u8; 4]),
                CandidateFile::new("b.mp4", vec![0u8; 4]),
                CandidateFile::new("README", vec![0u8; 4]),
            ])
            .await;

        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.rejected.len(), 2);
        assert_eq!(orchestrator.files().await.len(), 1);

        let notifications = notifier.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].severity, Severity::Warning);
        assert!(notifications[0].message.contains("b.mp4"));
        assert!(notifications[0].message.contains("README"));
    }

    #[tokio::test]
    async fn test_drop_all_valid_sends_no_notification() {
        let (orchestrator, _, notifier) = setup();
        orchestrator
            .on_files_dropped(vec![CandidateFile::new("a.wav", vec![0u8; 4])])
            .await;
        assert!(notifier.notifications().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_completes_file() {
        let (orchestrator, service, notifier) = setup();
        service
            .push_poll_results(
                "job-a.wav",
                vec![
                    Ok(JobStatusSnapshot::processing(40)),
                    Ok(JobStatusSnapshot::completed("/f/a.mp3")),
                ],
            )
            .await;
        let outcome = orchestrator
            .on_files_dropped(vec![CandidateFile::new("a.wav", vec![0u8; 4])])
            .await;
        let id = outcome.accepted[0].id;

        let report = orchestrator.run_batch(params()).await;

        assert_eq!(report.completed, vec![id]);
        let file = orchestrator.file(id).await.unwrap();
        assert_eq!(file.status, FileStatus::Completed);
        assert_eq!(file.progress_percent, 100);
        assert_eq!(file.artifact_ref.as_deref(), Some("/f/a.mp3"));
        assert_eq!(notifier.count(Severity::Success), 1);
        assert!(!orchestrator.queue().is_claimed(id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_updates_are_published() {
        let (orchestrator, service, _) = setup();
        service
            .push_poll_results(
                "job-a.wav",
                vec![
                    Ok(JobStatusSnapshot::processing(70)),
                    Ok(JobStatusSnapshot::processing(20)),
                    Ok(JobStatusSnapshot::completed("/f/a.mp3")),
                ],
            )
            .await;
        orchestrator
            .on_files_dropped(vec![CandidateFile::new("a.wav", vec![0u8; 4])])
            .await;
        let mut rx = orchestrator.subscribe();

        orchestrator.run_batch(params()).await;

        let mut progress = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let QueueEvent::FileUpdated { file, .. } = event {
                progress.push(file.progress_percent);
            }
        }
        assert_eq!(progress, vec![SUBMITTED_PROGRESS, 70, 20, 100]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_failure_marks_error() {
        let (orchestrator, service, notifier) = setup();
        service
            .fail_submit("a.wav", SubmitError::rejected(415, Some("Unsupported codec".into())))
            .await;
        let id = orchestrator
            .on_files_dropped(vec![CandidateFile::new("a.wav", vec![0u8; 4])])
            .await
            .accepted[0]
            .id;

        let report = orchestrator.run_batch(params()).await;

        assert_eq!(report.failed, vec![id]);
        let file = orchestrator.file(id).await.unwrap();
        assert_eq!(file.status, FileStatus::Error);
        assert_eq!(file.failure, Some(FailureKind::Submit));
        assert_eq!(file.error_detail.as_deref(), Some("Unsupported codec"));
        assert!(file.job_id.is_none());
        assert_eq!(notifier.count(Severity::Error), 1);
        assert_eq!(service.total_polls().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_params_fail_without_network() {
        let (orchestrator, service, _) = setup();
        let id = orchestrator
            .on_files_dropped(vec![CandidateFile::new("a.wav", vec![0u8; 4])])
            .await
            .accepted[0]
            .id;

        orchestrator.run_batch(ConversionParams::default()).await;

        let file = orchestrator.file(id).await.unwrap();
        assert_eq!(file.status, FileStatus::Error);
        assert_eq!(
            file.error_detail.as_deref(),
            Some("missing required parameter: target_format")
        );
        assert!(service.submit_calls().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_crashed_task_is_recorded_and_batch_continues() {
        let (orchestrator, service, _) = setup();
        service.panic_on_poll("job-a.wav").await;
        service
            .push_poll_results("job-b.wav", vec![Ok(JobStatusSnapshot::completed("/f/b.mp3"))])
            .await;
        let outcome = orchestrator
            .on_files_dropped(vec![
                CandidateFile::new("a.wav", vec![0u8; 4]),
                CandidateFile::new("b.wav", vec![0u8; 4]),
            ])
            .await;
        let (a, b) = (outcome.accepted[0].id, outcome.accepted[1].id);

        let report = orchestrator.run_batch(params()).await;

        assert_eq!(report.failed, vec![a]);
        assert_eq!(report.completed, vec![b]);
        let crashed = orchestrator.file(a).await.unwrap();
        assert_eq!(crashed.failure, Some(FailureKind::Internal));
        assert_eq!(crashed.error_detail.as_deref(), Some(TASK_CRASHED));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_batch_only_touches_pending_files() {
        let (orchestrator, service, _) = setup();
        service
            .set_fallback_poll(Ok(JobStatusSnapshot::completed("/f/out.mp3")))
            .await;
        orchestrator
            .on_files_dropped(vec![CandidateFile::new("a.wav", vec![0u8; 4])])
            .await;
        orchestrator.run_batch(params()).await;

        orchestrator
            .on_files_dropped(vec![CandidateFile::new("b.wav", vec![0u8; 4])])
            .await;
        let report = orchestrator.run_batch(params()).await;

        assert_eq!(report.total(), 1);
        let submitted: Vec<String> = service
            .submit_calls()
            .await
            .into_iter()
            .map(|c| c.file_name)
            .collect();
        assert_eq!(submitted, vec!["a.wav", "b.wav"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_batches_never_submit_twice() {
        let (orchestrator, service, _) = setup();
        service
            .set_fallback_poll(Ok(JobStatusSnapshot::completed("/f/out.mp3")))
            .await;
        orchestrator
            .on_files_dropped(vec![
                CandidateFile::new("a.wav", vec![0u8; 4]),
                CandidateFile::new("b.wav", vec![0u8; 4]),
            ])
            .await;

        let (first, second) =
            tokio::join!(orchestrator.run_batch(params()), orchestrator.run_batch(params()));

        assert_eq!(first.total() + second.total(), 2);
        assert_eq!(service.submit_calls().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_in_flight_file_is_refused() {
        let (orchestrator, service, _) = setup();
        service
            .set_fallback_poll(Err(TransportError::Timeout))
            .await;
        let id = orchestrator
            .on_files_dropped(vec![CandidateFile::new("a.wav", vec![0u8; 4])])
            .await
            .accepted[0]
            .id;

        let batch = orchestrator.claim_batch().await;
        assert!(matches!(
            orchestrator.remove_file(id).await,
            Err(OrchestratorError::NotRemovable { .. })
        ));

        orchestrator.run_claimed(batch, params()).await;
        assert!(orchestrator.remove_file(id).await.is_ok());
        assert!(orchestrator.files().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_artifact() {
        let (orchestrator, service, _) = setup();
        service
            .push_poll_results("job-a.wav", vec![Ok(JobStatusSnapshot::completed("/f/a.mp3"))])
            .await;
        service
            .set_download("https://convert.example.com/f/a.mp3", b"mp3".to_vec(), None)
            .await;
        let id = orchestrator
            .on_files_dropped(vec![CandidateFile::new("a.wav", vec![0u8; 4])])
            .await
            .accepted[0]
            .id;

        assert!(matches!(
            orchestrator.fetch_artifact(id).await,
            Err(OrchestratorError::Download(_))
        ));

        orchestrator.run_batch(params()).await;
        let artifact = orchestrator.fetch_artifact(id).await.unwrap();
        assert_eq!(artifact.file_name, "a.mp3");
        assert_eq!(artifact.content_type, "application/octet-stream");

        assert!(matches!(
            orchestrator.fetch_artifact(FileId::new()).await,
            Err(OrchestratorError::NotFound(_))
        ));
    }
}
