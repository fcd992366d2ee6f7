//! Mock conversion service for testing.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::converter::EndpointDescriptor;
use crate::download::DownloadError;
use crate::file::{JobId, JobStatusSnapshot};
use crate::service::{ConversionService, FetchedBody, SubmitError, TransportError, UploadRequest};

type PollResult = Result<JobStatusSnapshot, TransportError>;

/// A recorded submission for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSubmit {
    pub submit_path: &'static str,
    pub file_field: &'static str,
    pub file_name: String,
    pub size_bytes: usize,
    pub fields: Vec<(String, String)>,
}

/// Mock implementation of the ConversionService trait.
///
/// Provides controllable behavior for testing:
/// - Job ids are `job-{file_name}` unless a submit failure is scripted
/// - Poll results are served from a per-job feed, then a fallback
/// - Every call is recorded for assertions
///
/// # Example
///
/// ```rust,ignore
/// use transmute_core::testing::MockConversionService;
///
/// let service = MockConversionService::new();
/// service.push_poll_results("job-talk.wav", vec![
///     Err(TransportError::Timeout),
///     Ok(JobStatusSnapshot::completed("/f/talk.mp3")),
/// ]).await;
/// ```
#[derive(Debug)]
pub struct MockConversionService {
    /// Recorded submissions.
    submits: Arc<RwLock<Vec<RecordedSubmit>>>,
    /// Scripted submit failures by file name.
    submit_failures: Arc<RwLock<HashMap<String, SubmitError>>>,
    /// Queued poll results by job id.
    poll_feeds: Arc<RwLock<HashMap<String, VecDeque<PollResult>>>>,
    /// Served once a job's feed is empty.
    fallback_poll: Arc<RwLock<PollResult>>,
    /// Poll counts by job id.
    polls: Arc<RwLock<HashMap<String, usize>>>,
    /// Jobs whose poll panics.
    panicking_jobs: Arc<RwLock<HashSet<String>>>,
    /// Downloadable bodies by URL.
    downloads: Arc<RwLock<HashMap<String, FetchedBody>>>,
    /// Recorded download URLs.
    download_calls: Arc<RwLock<Vec<String>>>,
}

impl Default for MockConversionService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConversionService {
    /// Create a new mock service. Unscripted jobs stay queued forever.
    pub fn new() -> Self {
        Self {
            submits: Arc::new(RwLock::new(Vec::new())),
            submit_failures: Arc::new(RwLock::new(HashMap::new())),
            poll_feeds: Arc::new(RwLock::new(HashMap::new())),
            fallback_poll: Arc::new(RwLock::new(Ok(JobStatusSnapshot::queued()))),
            polls: Arc::new(RwLock::new(HashMap::new())),
            panicking_jobs: Arc::new(RwLock::new(HashSet::new())),
            downloads: Arc::new(RwLock::new(HashMap::new())),
            download_calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Make submissions of `file_name` fail.
    pub async fn fail_submit(&self, file_name: &str, error: SubmitError) {
        self.submit_failures
            .write()
            .await
            .insert(file_name.to_string(), error);
    }

    /// Append results to a job's poll feed.
    pub async fn push_poll_results(&self, job_id: &str, results: Vec<PollResult>) {
        self.poll_feeds
            .write()
            .await
            .entry(job_id.to_string())
            .or_default()
            .extend(results);
    }

    /// Result served once a job's feed runs out.
    pub async fn set_fallback_poll(&self, result: PollResult) {
        *self.fallback_poll.write().await = result;
    }

    /// Make every poll of `job_id` panic.
    pub async fn panic_on_poll(&self, job_id: &str) {
        self.panicking_jobs.write().await.insert(job_id.to_string());
    }

    /// Serve `bytes` for downloads of `url`.
    pub async fn set_download(&self, url: &str, bytes: Vec<u8>, content_type: Option<&str>) {
        self.downloads.write().await.insert(
            url.to_string(),
            FetchedBody {
                bytes: Bytes::from(bytes),
                content_type: content_type.map(str::to_string),
            },
        );
    }

    /// Get all recorded submissions.
    pub async fn submit_calls(&self) -> Vec<RecordedSubmit> {
        self.submits.read().await.clone()
    }

    /// Number of polls issued for `job_id`.
    pub async fn poll_count(&self, job_id: &str) -> usize {
        self.polls.read().await.get(job_id).copied().unwrap_or(0)
    }

    /// Number of polls issued across all jobs.
    pub async fn total_polls(&self) -> usize {
        self.polls.read().await.values().sum()
    }

    /// Get all recorded download URLs.
    pub async fn download_calls(&self) -> Vec<String> {
        self.download_calls.read().await.clone()
    }
}

#[async_trait]
impl ConversionService for MockConversionService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn submit(
        &self,
        endpoint: &EndpointDescriptor,
        upload: UploadRequest,
    ) -> Result<JobId, SubmitError> {
        self.submits.write().await.push(RecordedSubmit {
            submit_path: endpoint.submit_path,
            file_field: endpoint.file_field,
            file_name: upload.file_name.clone(),
            size_bytes: upload.payload.len(),
            fields: upload.fields,
        });

        if let Some(error) = self.submit_failures.read().await.get(&upload.file_name) {
            return Err(error.clone());
        }

        Ok(JobId::new(format!("job-{}", upload.file_name)))
    }

    async fn poll_status(
        &self,
        _endpoint: &EndpointDescriptor,
        job_id: &JobId,
    ) -> Result<JobStatusSnapshot, TransportError> {
        *self
            .polls
            .write()
            .await
            .entry(job_id.as_str().to_string())
            .or_insert(0) += 1;

        let panics = self.panicking_jobs.read().await.contains(job_id.as_str());
        if panics {
            panic!("scripted panic while polling {}", job_id);
        }

        let next = self
            .poll_feeds
            .write()
            .await
            .get_mut(job_id.as_str())
            .and_then(VecDeque::pop_front);

        match next {
            Some(result) => result,
            None => self.fallback_poll.read().await.clone(),
        }
    }

    async fn download(&self, url: &Url) -> Result<FetchedBody, DownloadError> {
        self.download_calls.write().await.push(url.to_string());

        self.downloads
            .read()
            .await
            .get(url.as_str())
            .cloned()
            .ok_or(DownloadError::Http { status: 404 })
    }
}
