use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Job state as reported by the remote conversion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteJobState {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl RemoteJobState {
    /// Whether polling should stop after seeing this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteJobState::Completed | RemoteJobState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteJobState::Queued => "queued",
            RemoteJobState::Processing => "processing",
            RemoteJobState::Completed => "completed",
            RemoteJobState::Failed => "failed",
        }
    }
}

impl fmt::Display for RemoteJobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemoteJobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => Ok(RemoteJobState::Queued),
            "processing" => Ok(RemoteJobState::Processing),
            "completed" => Ok(RemoteJobState::Completed),
            "failed" => Ok(RemoteJobState::Failed),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// One polling response. Only used to update a `ManagedFile`, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusSnapshot {
    pub status: RemoteJobState,
    /// 0-100, as reported (clamped) by the service.
    pub progress_percent: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl JobStatusSnapshot {
    pub fn queued() -> Self {
        Self::with_state(RemoteJobState::Queued, 0)
    }

    pub fn processing(progress_percent: u8) -> Self {
        Self::with_state(RemoteJobState::Processing, progress_percent)
    }

    pub fn completed(artifact_ref: impl Into<String>) -> Self {
        Self {
            artifact_ref: Some(artifact_ref.into()),
            ..Self::with_state(RemoteJobState::Completed, 100)
        }
    }

    pub fn failed(error_detail: impl Into<String>) -> Self {
        Self {
            error_detail: Some(error_detail.into()),
            ..Self::with_state(RemoteJobState::Failed, 0)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    fn with_state(status: RemoteJobState, progress_percent: u8) -> Self {
        Self {
            status,
            progress_percent: progress_percent.min(100),
            message: String::new(),
            artifact_ref: None,
            error_detail: None,
        }
    }
}
