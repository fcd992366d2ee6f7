//! Error types for the remote conversion service.

use thiserror::Error;

use crate::converter::ParamsError;

/// Fallback shown when the service rejects a submission without saying why.
pub const GENERIC_SUBMIT_FAILURE: &str = "submission failed";

/// Errors from submitting a file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Parameters failed local checks; nothing was sent.
    #[error(transparent)]
    InvalidParams(#[from] ParamsError),

    /// The service answered with a non-success status.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The request never got a response.
    #[error("could not reach conversion service: {0}")]
    Transport(String),

    /// The service accepted the file but the response carried no job id.
    #[error("malformed submission response: {0}")]
    MalformedResponse(String),
}

impl SubmitError {
    /// Creates a rejection, falling back to the generic message when the
    /// service gave none.
    pub fn rejected(status: u16, message: Option<String>) -> Self {
        Self::Rejected {
            status,
            message: message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| GENERIC_SUBMIT_FAILURE.to_string()),
        }
    }

    /// Whether the remote side actively refused the request (as opposed to
    /// never being reached).
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::InvalidParams(_))
    }

    /// Short stable code, used for metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParams(_) => "invalid_params",
            Self::Rejected { .. } => "rejected",
            Self::Transport(_) => "transport",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }
}

/// A failure reaching the service or understanding its answer while polling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Connection could not be established or was dropped.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Non-success HTTP status.
    #[error("unexpected HTTP status {status}")]
    Http { status: u16 },

    /// Body could not be parsed.
    #[error("failed to parse status response: {0}")]
    Parse(String),

    /// Status string not recognized.
    #[error("unknown job status: {0}")]
    UnknownStatus(String),
}

impl TransportError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connection(_) => "connection",
            Self::Http { .. } => "http",
            Self::Parse(_) => "parse",
            Self::UnknownStatus(_) => "unknown_status",
        }
    }
}

/// Errors constructing a service client.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The configured base URL is not an absolute http(s) URL.
    #[error("invalid service URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
