use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validator::CandidateFile;

use super::ids::{FileId, JobId};
use super::snapshot::{JobStatusSnapshot, RemoteJobState};

/// Progress shown once the service has accepted a job, to tell
/// "accepted" apart from "not yet tried".
pub const SUBMITTED_PROGRESS: u8 = 10;

const JOB_FAILED_FALLBACK: &str = "conversion failed";
const MISSING_ARTIFACT: &str = "job completed without an artifact";

/// Lifecycle status of a managed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    Uploading,
    Processing,
    Completed,
    Error,
}

impl FileStatus {
    pub const ALL: [FileStatus; 5] = [
        FileStatus::Pending,
        FileStatus::Uploading,
        FileStatus::Processing,
        FileStatus::Completed,
        FileStatus::Error,
    ];

    /// `Completed` and `Error` admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FileStatus::Completed | FileStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Uploading => "uploading",
            FileStatus::Processing => "processing",
            FileStatus::Completed => "completed",
            FileStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a terminal error, so callers need not match on messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The service (or local parameter checks) rejected the submission.
    Submit,
    /// The service reported that the job failed.
    JobFailed,
    /// Attempt ceiling reached without a terminal snapshot.
    TimedOut,
    /// Too many consecutive transport failures while polling.
    LostConnection,
    /// The file's lifecycle task crashed.
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Submit => "submit",
            FailureKind::JobFailed => "job_failed",
            FailureKind::TimedOut => "timed_out",
            FailureKind::LostConnection => "lost_connection",
            FailureKind::Internal => "internal",
        }
    }
}

/// Attempted a transition the state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {action} file {file_id} in state {from}")]
pub struct TransitionError {
    pub file_id: FileId,
    pub action: &'static str,
    pub from: FileStatus,
}

/// One user-selected file under orchestration.
///
/// `id` never changes after creation. The payload is held only until the
/// file is submitted. The status-related fields only change through the
/// transition methods, each of which returns a new value and leaves `self`
/// untouched.
#[derive(Debug, Clone)]
pub struct ManagedFile {
    id: FileId,
    name: String,
    size_bytes: u64,
    payload: Bytes,
    status: FileStatus,
    progress_percent: u8,
    job_id: Option<JobId>,
    artifact_ref: Option<String>,
    error_detail: Option<String>,
    failure: Option<FailureKind>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ManagedFile {
    /// Wrap a validated candidate as a new pending file.
    pub fn new(candidate: CandidateFile) -> Self {
        let now = Utc::now();
        Self {
            id: FileId::new(),
            name: candidate.name,
            size_bytes: candidate.size_bytes,
            payload: candidate.payload,
            status: FileStatus::Pending,
            progress_percent: 0,
            job_id: None,
            artifact_ref: None,
            error_detail: None,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn status(&self) -> FileStatus {
        self.status
    }

    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.job_id.as_ref()
    }

    pub fn artifact_ref(&self) -> Option<&str> {
        self.artifact_ref.as_deref()
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    pub fn failure(&self) -> Option<FailureKind> {
        self.failure
    }

    /// Only pending and errored files may be removed; anything else may
    /// still have a remote job attached to it.
    pub fn is_removable(&self) -> bool {
        matches!(self.status, FileStatus::Pending | FileStatus::Error)
    }

    /// `pending -> uploading`, recording the job id.
    pub fn mark_submitted(&self, job_id: JobId) -> Result<Self, TransitionError> {
        if self.status != FileStatus::Pending {
            return Err(self.transition_error("submit"));
        }

        Ok(Self {
            status: FileStatus::Uploading,
            progress_percent: SUBMITTED_PROGRESS,
            job_id: Some(job_id),
            payload: Bytes::new(),
            updated_at: Utc::now(),
            ..self.clone()
        })
    }

    /// Apply one poll snapshot to an uploading or processing file.
    ///
    /// Non-terminal progress is taken exactly as reported, even if it goes
    /// backwards.
    pub fn apply_snapshot(&self, snapshot: &JobStatusSnapshot) -> Result<Self, TransitionError> {
        if !matches!(self.status, FileStatus::Uploading | FileStatus::Processing) {
            return Err(self.transition_error("apply snapshot to"));
        }

        let now = Utc::now();
        let next = match snapshot.status {
            RemoteJobState::Queued | RemoteJobState::Processing => Self {
                status: FileStatus::Processing,
                progress_percent: snapshot.progress_percent.min(100),
                updated_at: now,
                ..self.clone()
            },
            RemoteJobState::Completed => match &snapshot.artifact_ref {
                Some(artifact) => Self {
                    status: FileStatus::Completed,
                    progress_percent: 100,
                    artifact_ref: Some(artifact.clone()),
                    error_detail: None,
                    failure: None,
                    updated_at: now,
                    ..self.clone()
                },
                None => self.failed_copy(FailureKind::JobFailed, MISSING_ARTIFACT.to_string()),
            },
            RemoteJobState::Failed => {
                let detail = snapshot
                    .error_detail
                    .clone()
                    .filter(|d| !d.trim().is_empty())
                    .or_else(|| Some(snapshot.message.clone()).filter(|m| !m.trim().is_empty()))
                    .unwrap_or_else(|| JOB_FAILED_FALLBACK.to_string());
                self.failed_copy(FailureKind::JobFailed, detail)
            }
        };

        Ok(next)
    }

    /// Move any non-terminal file to `error`.
    pub fn mark_failed(
        &self,
        failure: FailureKind,
        detail: impl Into<String>,
    ) -> Result<Self, TransitionError> {
        if self.status.is_terminal() {
            return Err(self.transition_error("fail"));
        }
        Ok(self.failed_copy(failure, detail.into()))
    }

    /// Check the model invariants, returning a description of the first
    /// violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        let completed = self.status == FileStatus::Completed;
        if self.artifact_ref.is_some() != completed {
            return Err(format!(
                "artifact_ref set={} but status={}",
                self.artifact_ref.is_some(),
                self.status
            ));
        }
        if completed && self.progress_percent != 100 {
            return Err(format!("completed with progress {}", self.progress_percent));
        }
        if self.progress_percent > 100 {
            return Err(format!("progress {} out of range", self.progress_percent));
        }
        match self.status {
            FileStatus::Pending if self.job_id.is_some() => {
                return Err("pending file has a job id".to_string());
            }
            FileStatus::Uploading | FileStatus::Processing | FileStatus::Completed
                if self.job_id.is_none() =>
            {
                return Err(format!("{} file has no job id", self.status));
            }
            _ => {}
        }
        if (self.status == FileStatus::Error) != self.error_detail.is_some() {
            return Err(format!(
                "error_detail set={} but status={}",
                self.error_detail.is_some(),
                self.status
            ));
        }
        Ok(())
    }

    /// Read-only projection for rendering.
    pub fn view(&self) -> FileView {
        FileView {
            id: self.id,
            name: self.name.clone(),
            size_bytes: self.size_bytes,
            status: self.status,
            progress_percent: self.progress_percent,
            job_id: self.job_id.clone(),
            artifact_ref: self.artifact_ref.clone(),
            error_detail: self.error_detail.clone(),
            failure: self.failure,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn failed_copy(&self, failure: FailureKind, detail: String) -> Self {
        Self {
            status: FileStatus::Error,
            artifact_ref: None,
            error_detail: Some(detail),
            failure: Some(failure),
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    fn transition_error(&self, action: &'static str) -> TransitionError {
        TransitionError {
            file_id: self.id,
            action,
            from: self.status,
        }
    }
}

/// Serializable view of a [`ManagedFile`], without the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileView {
    pub id: FileId,
    pub name: String,
    pub size_bytes: u64,
    pub status: FileStatus,
    pub progress_percent: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
