//! Trait definitions for the remote conversion service.

use async_trait::async_trait;
use reqwest::Url;

use crate::converter::EndpointDescriptor;
use crate::download::DownloadError;
use crate::file::{JobId, JobStatusSnapshot};

use super::error::{SubmitError, TransportError};
use super::types::{FetchedBody, UploadRequest};

/// The hosted service that actually converts files.
///
/// Every call is parameterized by the endpoint descriptor of the converter
/// kind making it, so one implementation serves all kinds.
#[async_trait]
pub trait ConversionService: Send + Sync {
    /// Returns the name of this service implementation.
    fn name(&self) -> &str;

    /// Upload a file and start a job. Exactly one request is made.
    ///
    /// A returned id only means the service accepted the work; the job may
    /// not have started yet.
    async fn submit(
        &self,
        endpoint: &EndpointDescriptor,
        upload: UploadRequest,
    ) -> Result<JobId, SubmitError>;

    /// Fetch the current status of a job. Idempotent.
    async fn poll_status(
        &self,
        endpoint: &EndpointDescriptor,
        job_id: &JobId,
    ) -> Result<JobStatusSnapshot, TransportError>;

    /// Fetch the bytes of a finished artifact.
    async fn download(&self, url: &Url) -> Result<FetchedBody, DownloadError>;
}
