//! Per-kind capability descriptors.
//!
//! Each converter kind differs from the others only in the endpoints it
//! talks to, the multipart field carrying the file, the files it accepts
//! and how patiently it polls. Everything else is shared.

use serde::Serialize;

use crate::file::JobId;
use crate::poller::RetryPolicy;
use crate::validator::ValidationRules;

use super::types::{ConverterKind, ParamKey};

const MIB: u64 = 1024 * 1024;

/// Remote endpoint shape for one converter kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EndpointDescriptor {
    /// Path that accepts the multipart upload.
    pub submit_path: &'static str,
    /// Status path, with a `{job_id}` placeholder.
    pub status_path: &'static str,
    /// Multipart field name for the file part.
    pub file_field: &'static str,
    /// Response field carrying the job id (`jobId` is always accepted too).
    pub job_id_field: &'static str,
}

impl EndpointDescriptor {
    /// Status path for a specific job, with the id percent-encoded.
    pub fn status_path_for(&self, job_id: &JobId) -> String {
        self.status_path
            .replace("{job_id}", &urlencoding::encode(job_id.as_str()))
    }
}

/// Everything the core needs to know about one converter kind.
#[derive(Debug, Clone, Serialize)]
pub struct ConverterCapabilities {
    pub kind: ConverterKind,
    pub endpoint: EndpointDescriptor,
    pub required_params: &'static [ParamKey],
    pub default_rules: ValidationRules,
    pub default_policy: RetryPolicy,
}

impl ConverterKind {
    /// Endpoint descriptor for this kind.
    pub fn endpoint(&self) -> EndpointDescriptor {
        match self {
            Self::Video => EndpointDescriptor {
                submit_path: "/api/video/convert",
                status_path: "/api/video/status/{job_id}",
                file_field: "video",
                job_id_field: "job_id",
            },
            Self::Audio => EndpointDescriptor {
                submit_path: "/api/audio/convert",
                status_path: "/api/audio/status/{job_id}",
                file_field: "audio",
                job_id_field: "job_id",
            },
            Self::Document => EndpointDescriptor {
                submit_path: "/api/document/convert",
                status_path: "/api/document/status/{job_id}",
                file_field: "file",
                job_id_field: "job_id",
            },
            Self::PdfProtect => EndpointDescriptor {
                submit_path: "/api/pdf/protect",
                status_path: "/api/pdf/status/{job_id}",
                file_field: "pdf",
                job_id_field: "job_id",
            },
        }
    }

    /// Parameters that must be present before a job is submitted.
    pub fn required_params(&self) -> &'static [ParamKey] {
        match self {
            Self::Video | Self::Audio | Self::Document => &[ParamKey::TargetFormat],
            Self::PdfProtect => &[ParamKey::Password],
        }
    }

    /// Default accepted extensions and size limit.
    pub fn default_rules(&self) -> ValidationRules {
        match self {
            Self::Video => ValidationRules::new(
                ["mp4", "mov", "avi", "mkv", "webm", "flv", "wmv", "m4v"],
                500 * MIB,
            ),
            Self::Audio => ValidationRules::new(
                ["mp3", "wav", "flac", "aac", "ogg", "m4a", "wma", "opus"],
                100 * MIB,
            ),
            Self::Document => ValidationRules::new(
                [
                    "pdf", "doc", "docx", "odt", "rtf", "txt", "html", "xls", "xlsx", "ppt",
                    "pptx",
                ],
                50 * MIB,
            ),
            Self::PdfProtect => ValidationRules::new(["pdf"], 50 * MIB),
        }
    }

    /// Default polling policy. Larger media polls less often and longer.
    pub fn default_policy(&self) -> RetryPolicy {
        let (poll_interval_ms, max_attempts, initial_delay_ms) = match self {
            Self::Video => (5000, 180, 2000),
            Self::Audio => (2000, 120, 1000),
            Self::Document => (1000, 120, 1000),
            Self::PdfProtect => (1000, 120, 500),
        };

        RetryPolicy {
            max_attempts,
            max_consecutive_transport_failures: 3,
            poll_interval_ms,
            initial_delay_ms,
        }
    }

    /// Full descriptor with defaults.
    pub fn capabilities(&self) -> ConverterCapabilities {
        ConverterCapabilities {
            kind: *self,
            endpoint: self.endpoint(),
            required_params: self.required_params(),
            default_rules: self.default_rules(),
            default_policy: self.default_policy(),
        }
    }
}
