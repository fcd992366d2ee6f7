//! Types for file validation.

use std::collections::BTreeSet;
use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::rules::format_size;

/// A file the user selected, before it has been validated or queued.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    /// Original file name, including extension.
    pub name: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Raw file contents.
    pub payload: Bytes,
}

impl CandidateFile {
    /// Create a candidate whose size is taken from the payload.
    pub fn new(name: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            name: name.into(),
            size_bytes: payload.len() as u64,
            payload,
        }
    }

    /// The lowercased extension of the file name, if it has a non-empty one.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// Extension and size limits applied to candidate files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRules {
    /// Allowed extensions, lowercase and without a leading dot.
    pub allowed_extensions: BTreeSet<String>,
    /// Largest accepted file size. Files exactly this size pass.
    pub max_size_bytes: u64,
}

impl ValidationRules {
    /// Build a rule set, normalizing extensions to lowercase without dots.
    pub fn new<I, E>(allowed_extensions: I, max_size_bytes: u64) -> Self
    where
        I: IntoIterator<Item = E>,
        E: AsRef<str>,
    {
        let allowed_extensions = allowed_extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        Self {
            allowed_extensions,
            max_size_bytes,
        }
    }

    /// Whether the given extension (any case, with or without a dot) is allowed.
    pub fn allows_extension(&self, extension: &str) -> bool {
        let normalized = extension.trim_start_matches('.').to_ascii_lowercase();
        self.allowed_extensions.contains(&normalized)
    }

    /// Allowed extensions in sorted order.
    pub fn allowed_list(&self) -> Vec<String> {
        self.allowed_extensions.iter().cloned().collect()
    }
}

/// Why a candidate file was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    /// The file name has no extension.
    #[error("file has no extension")]
    NoExtension,

    /// The extension is not in the allowed set.
    #[error("unsupported file type .{extension} (allowed: {})", allowed.join(", "))]
    UnsupportedExtension {
        extension: String,
        allowed: Vec<String>,
    },

    /// The file exceeds the size limit.
    #[error("file is {}, limit is {}", format_size(*actual_size), format_size(*max_size))]
    TooLarge { actual_size: u64, max_size: u64 },
}

impl Rejection {
    /// Short stable code, used for metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::NoExtension => "no_extension",
            Rejection::UnsupportedExtension { .. } => "unsupported_extension",
            Rejection::TooLarge { .. } => "too_large",
        }
    }
}

/// Outcome of validating one file.
pub type ValidationResult = Result<(), Rejection>;

/// A file that failed validation, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedFile {
    pub name: String,
    pub reason: Rejection,
}

/// A batch of candidates split by validation outcome.
#[derive(Debug, Default)]
pub struct Partition {
    pub accepted: Vec<CandidateFile>,
    pub rejected: Vec<RejectedFile>,
}

impl Partition {
    /// One human-readable line summarizing every rejection, if any.
    pub fn rejection_summary(&self) -> Option<String> {
        if self.rejected.is_empty() {
            return None;
        }

        let details: Vec<String> = self
            .rejected
            .iter()
            .map(|r| format!("{} ({})", r.name, r.reason))
            .collect();

        let noun = if self.rejected.len() == 1 { "file was" } else { "files were" };
        Some(format!(
            "{} {} rejected: {}",
            self.rejected.len(),
            noun,
            details.join("; ")
        ))
    }
}
