//! Download resolution for completed files.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::Url;
use thiserror::Error;
use tracing::{debug, error};

use crate::file::{FileId, FileStatus, ManagedFile};
use crate::service::ConversionService;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Errors resolving or fetching an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    /// Asked for the artifact of a file that has not completed. This is a
    /// caller bug, never retried.
    #[error("artifact requested for file {file_id} in state {status}")]
    NotCompleted { file_id: FileId, status: FileStatus },

    /// The artifact reference could not be turned into a URL.
    #[error("invalid artifact reference {reference}: {reason}")]
    InvalidReference { reference: String, reason: String },

    /// The download request failed.
    #[error("download failed: {0}")]
    Fetch(String),

    /// The service answered the download with a non-success status.
    #[error("download failed with HTTP status {status}")]
    Http { status: u16 },
}

impl DownloadError {
    /// Whether trying again could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Http { .. })
    }
}

/// Where a completed file's output can be fetched from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArtifact {
    pub file_id: FileId,
    pub url: Url,
    /// Name to offer the user when saving.
    pub file_name: String,
}

/// A fetched artifact, ready to hand to the user.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_id: FileId,
    pub url: Url,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Resolves artifact references of completed files.
pub struct DownloadResolver<S: ?Sized> {
    service: Arc<S>,
    base_url: Url,
}

impl<S: ?Sized> Clone for DownloadResolver<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            base_url: self.base_url.clone(),
        }
    }
}

impl<S> DownloadResolver<S>
where
    S: ConversionService + ?Sized,
{
    /// Relative references are resolved against `base_url`.
    pub fn new(service: Arc<S>, base_url: Url) -> Self {
        Self { service, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a completed file's artifact to an absolute URL. No I/O.
    pub fn resolve(&self, file: &ManagedFile) -> Result<ResolvedArtifact, DownloadError> {
        let reference = match (file.status(), file.artifact_ref()) {
            (FileStatus::Completed, Some(reference)) => reference,
            (status, _) => {
                error!(
                    file_id = %file.id(),
                    status = %status,
                    "Artifact requested for a file that has not completed"
                );
                return Err(DownloadError::NotCompleted {
                    file_id: file.id(),
                    status,
                });
            }
        };

        let url = resolve_reference(&self.base_url, reference)?;
        let file_name = suggested_file_name(file.name(), &url);

        Ok(ResolvedArtifact {
            file_id: file.id(),
            url,
            file_name,
        })
    }

    /// Resolve and fetch the artifact bytes with a single request.
    pub async fn fetch(&self, file: &ManagedFile) -> Result<Artifact, DownloadError> {
        let resolved = self.resolve(file)?;
        debug!(file_id = %file.id(), url = %resolved.url, "Fetching artifact");

        let body = self.service.download(&resolved.url).await?;

        Ok(Artifact {
            file_id: resolved.file_id,
            url: resolved.url,
            file_name: resolved.file_name,
            content_type: body
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            bytes: body.bytes,
        })
    }
}

/// Absolute references are used as-is; anything else is joined onto `base`.
pub(crate) fn resolve_reference(base: &Url, reference: &str) -> Result<Url, DownloadError> {
    let reference = reference.trim();
    let invalid = |reason: String| DownloadError::InvalidReference {
        reference: reference.to_string(),
        reason,
    };

    if reference.is_empty() {
        return Err(invalid("empty reference".to_string()));
    }

    match Url::parse(reference) {
        Ok(url) => Ok(url),
        Err(_) => base.join(reference).map_err(|e| invalid(e.to_string())),
    }
}

/// Original stem plus the artifact's extension; falls back to the artifact's
/// last path segment, then the original name.
fn suggested_file_name(original: &str, url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::decode(s).map(|d| d.into_owned()).unwrap_or_else(|_| s.to_string()));

    let stem = Path::new(original).file_stem().and_then(|s| s.to_str());
    let extension = segment
        .as_deref()
        .and_then(|s| Path::new(s).extension())
        .and_then(|e| e.to_str());

    match (stem, extension, segment.as_deref()) {
        (Some(stem), Some(ext), _) => format!("{}.{}", stem, ext),
        (_, _, Some(segment)) => segment.to_string(),
        _ => original.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{FailureKind, JobId, JobStatusSnapshot};
    use crate::testing::MockConversionService;
    use crate::validator::CandidateFile;

    fn base() -> Url {
        Url::parse("https://convert.example.com/api/").unwrap()
    }

    fn completed(name: &str, artifact: &str) -> ManagedFile {
        ManagedFile::new(CandidateFile::new(name, vec![1u8; 4]))
            .mark_submitted(JobId::new("job-1"))
            .unwrap()
            .apply_snapshot(&JobStatusSnapshot::completed(artifact))
            .unwrap()
    }

    fn resolver(service: MockConversionService) -> DownloadResolver<MockConversionService> {
        DownloadResolver::new(Arc::new(service), base())
    }

    #[test]
    fn test_relative_reference_joins_base() {
        let url = resolve_reference(&base(), "/f/x.mp3").unwrap();
        assert_eq!(url.as_str(), "https://convert.example.com/f/x.mp3");

        let url = resolve_reference(&base(), "files/x.mp3").unwrap();
        assert_eq!(url.as_str(), "https://convert.example.com/api/files/x.mp3");
    }

    #[test]
    fn test_absolute_reference_used_as_is() {
        let url = resolve_reference(&base(), "https://cdn.example.net/out/x.mp3?sig=1").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.net/out/x.mp3?sig=1");
    }

    #[test]
    fn test_empty_reference_is_invalid() {
        let err = resolve_reference(&base(), "  ").unwrap_err();
        assert!(matches!(err, DownloadError::InvalidReference { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_suggested_file_name() {
        let url = Url::parse("https://x.test/f/abc123.mp3").unwrap();
        assert_eq!(suggested_file_name("My Song.wav", &url), "My Song.mp3");

        let url = Url::parse("https://x.test/f/output").unwrap();
        assert_eq!(suggested_file_name("My Song.wav", &url), "output");

        let url = Url::parse("https://x.test/").unwrap();
        assert_eq!(suggested_file_name("My Song.wav", &url), "My Song.wav");
    }

    #[test]
    fn test_resolve_completed_file() {
        let resolver = resolver(MockConversionService::new());
        let file = completed("report.docx", "/f/report.pdf");

        let resolved = resolver.resolve(&file).unwrap();
        assert_eq!(resolved.url.as_str(), "https://convert.example.com/f/report.pdf");
        assert_eq!(resolved.file_name, "report.pdf");
        assert_eq!(resolved.file_id, file.id());
    }

    #[test]
    fn test_resolve_rejects_non_completed_file() {
        let resolver = resolver(MockConversionService::new());

        let pending = ManagedFile::new(CandidateFile::new("a.wav", vec![0u8]));
        let err = resolver.resolve(&pending).unwrap_err();
        assert_eq!(
            err,
            DownloadError::NotCompleted {
                file_id: pending.id(),
                status: FileStatus::Pending,
            }
        );
        assert!(!err.is_retryable());

        let failed = pending.mark_failed(FailureKind::Submit, "nope").unwrap();
        assert!(matches!(
            resolver.resolve(&failed),
            Err(DownloadError::NotCompleted { status: FileStatus::Error, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_makes_one_request() {
        let service = MockConversionService::new();
        service
            .set_download("https://convert.example.com/f/x.mp3", b"ID3".to_vec(), Some("audio/mpeg"))
            .await;
        let service = Arc::new(service);
        let resolver = DownloadResolver::new(Arc::clone(&service), base());

        let artifact = resolver.fetch(&completed("x.wav", "/f/x.mp3")).await.unwrap();
        assert_eq!(artifact.bytes.as_ref(), b"ID3");
        assert_eq!(artifact.content_type, "audio/mpeg");
        assert_eq!(artifact.file_name, "x.mp3");
        assert_eq!(service.download_calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_non_completed_makes_no_request() {
        let service = Arc::new(MockConversionService::new());
        let resolver = DownloadResolver::new(Arc::clone(&service), base());

        let pending = ManagedFile::new(CandidateFile::new("a.wav", vec![0u8]));
        assert!(resolver.fetch(&pending).await.is_err());
        assert!(service.download_calls().await.is_empty());
    }
}
