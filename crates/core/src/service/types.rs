//! Request and wire types for the remote conversion service.

use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;

use crate::file::{JobId, JobStatusSnapshot, RemoteJobState};

use super::error::TransportError;

/// One file upload plus its conversion parameters.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub payload: Bytes,
    /// Text fields sent alongside the file part.
    pub fields: Vec<(String, String)>,
}

/// Bytes fetched for a completed artifact.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Status payload as returned by the service.
#[derive(Debug, Deserialize)]
pub(crate) struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "downloadUrl")]
    pub download_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusResponse {
    /// Convert into a snapshot. Missing progress counts as 0; values outside
    /// 0..=100 are clamped.
    pub fn into_snapshot(self) -> Result<JobStatusSnapshot, TransportError> {
        let status: RemoteJobState = self
            .status
            .parse()
            .map_err(|_| TransportError::UnknownStatus(self.status.clone()))?;

        let progress = self.progress.unwrap_or(0.0);
        let progress_percent = if progress.is_finite() {
            progress.round().clamp(0.0, 100.0) as u8
        } else {
            0
        };

        Ok(JobStatusSnapshot {
            status,
            progress_percent,
            message: self.message.unwrap_or_default(),
            artifact_ref: self.download_url.filter(|u| !u.trim().is_empty()),
            error_detail: self.error.filter(|e| !e.trim().is_empty()),
        })
    }
}

/// Pull the job id out of a submission response body.
///
/// Accepts the descriptor's field name or `jobId`, as a string or a number.
pub(crate) fn extract_job_id(body: &Value, field: &str) -> Option<JobId> {
    [field, "jobId"]
        .iter()
        .filter_map(|name| body.get(*name))
        .find_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(JobId::new(s.trim())),
            Value::Number(n) => Some(JobId::new(n.to_string())),
            _ => None,
        })
}

/// Pull a human-readable error out of a failed response body, if any.
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error", "message", "detail"]
        .iter()
        .filter_map(|name| value.get(*name))
        .find_map(|v| v.as_str().map(str::trim).filter(|s| !s.is_empty()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<JobStatusSnapshot, TransportError> {
        serde_json::from_value::<StatusResponse>(value)
            .unwrap()
            .into_snapshot()
    }

    #[test]
    fn test_status_defaults_progress_to_zero() {
        let snapshot = parse(json!({"status": "queued"})).unwrap();
        assert_eq!(snapshot.status, RemoteJobState::Queued);
        assert_eq!(snapshot.progress_percent, 0);
        assert_eq!(snapshot.message, "");
    }

    #[test]
    fn test_status_clamps_progress() {
        assert_eq!(parse(json!({"status": "processing", "progress": 140})).unwrap().progress_percent, 100);
        assert_eq!(parse(json!({"status": "processing", "progress": -3})).unwrap().progress_percent, 0);
        assert_eq!(parse(json!({"status": "processing", "progress": 39.6})).unwrap().progress_percent, 40);
    }

    #[test]
    fn test_status_accepts_camel_case_download_url() {
        let snapshot = parse(json!({
            "status": "completed",
            "progress": 100,
            "downloadUrl": "/f/x.mp3"
        }))
        .unwrap();
        assert_eq!(snapshot.artifact_ref.as_deref(), Some("/f/x.mp3"));
    }

    #[test]
    fn test_status_failed_carries_error() {
        let snapshot = parse(json!({"status": "failed", "error": "codec not supported"})).unwrap();
        assert_eq!(snapshot.status, RemoteJobState::Failed);
        assert_eq!(snapshot.error_detail.as_deref(), Some("codec not supported"));
    }

    #[test]
    fn test_unknown_status_is_transport_error() {
        let err = parse(json!({"status": "exploded"})).unwrap_err();
        assert_eq!(err, TransportError::UnknownStatus("exploded".to_string()));
    }

    #[test]
    fn test_extract_job_id() {
        assert_eq!(extract_job_id(&json!({"job_id": "a1"}), "job_id"), Some(JobId::new("a1")));
        assert_eq!(extract_job_id(&json!({"jobId": "b2"}), "job_id"), Some(JobId::new("b2")));
        assert_eq!(extract_job_id(&json!({"job_id": 42}), "job_id"), Some(JobId::new("42")));
        assert_eq!(extract_job_id(&json!({"job_id": ""}), "job_id"), None);
        assert_eq!(extract_job_id(&json!({"id": "c3"}), "job_id"), None);
    }

    #[test]
    fn test_extract_error_message() {
        assert_eq!(
            extract_error_message(r#"{"error":"File too large"}"#),
            Some("File too large".to_string())
        );
        assert_eq!(
            extract_error_message(r#"{"message":"Unsupported"}"#),
            Some("Unsupported".to_string())
        );
        assert_eq!(extract_error_message("<html>502</html>"), None);
        assert_eq!(extract_error_message(r#"{"error":""}"#), None);
    }
}
