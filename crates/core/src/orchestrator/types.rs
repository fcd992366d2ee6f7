//! Types for the conversion orchestrator.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::converter::ConverterKind;
use crate::download::DownloadError;
use crate::file::{FileId, FileStatus, FileView, TransitionError};
use crate::validator::RejectedFile;

/// Errors returned by orchestrator operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// No file with this id is queued.
    #[error("file not found: {0}")]
    NotFound(FileId),

    /// The file may still have a remote job attached.
    #[error("file {file_id} cannot be removed while {status}")]
    NotRemovable { file_id: FileId, status: FileStatus },

    /// A state machine transition was refused.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Resolving or fetching an artifact failed.
    #[error(transparent)]
    Download(#[from] DownloadError),
}

impl OrchestratorError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Download(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Change notifications for the rendering layer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    FileAdded {
        kind: ConverterKind,
        file: FileView,
    },
    FileUpdated {
        kind: ConverterKind,
        file: FileView,
    },
    FileRemoved {
        kind: ConverterKind,
        file_id: FileId,
    },
    BatchStarted {
        kind: ConverterKind,
        batch_id: Uuid,
        file_ids: Vec<FileId>,
    },
    BatchFinished {
        kind: ConverterKind,
        report: BatchReport,
    },
}

/// Files claimed for one batch run, not yet processed.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimedBatch {
    pub batch_id: Uuid,
    pub file_ids: Vec<FileId>,
}

impl ClaimedBatch {
    pub fn is_empty(&self) -> bool {
        self.file_ids.is_empty()
    }
}

/// Outcome of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub kind: ConverterKind,
    pub completed: Vec<FileId>,
    pub failed: Vec<FileId>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}

/// Result of handing a set of dropped files to the orchestrator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DropOutcome {
    pub accepted: Vec<FileView>,
    pub rejected: Vec<RejectedFile>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::ManagedFile;
    use crate::validator::CandidateFile;

    #[test]
    fn test_queue_event_is_tagged() {
        let file = ManagedFile::new(CandidateFile::new("a.mp3", vec![1u8]));
        let event = QueueEvent::FileAdded {
            kind: ConverterKind::Audio,
            file: file.view(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "file_added");
        assert_eq!(json["kind"], "audio");
        assert_eq!(json["file"]["status"], "pending");
    }

    #[test]
    fn test_error_display() {
        let file_id = FileId::new();
        let err = OrchestratorError::NotRemovable {
            file_id,
            status: FileStatus::Processing,
        };
        assert_eq!(
            err.to_string(),
            format!("file {} cannot be removed while processing", file_id)
        );
        assert!(!err.is_retryable());

        let err = OrchestratorError::from(DownloadError::Http { status: 503 });
        assert!(err.is_retryable());
    }
}
