//! Validation rules applied to candidate files.

use super::types::{CandidateFile, Partition, RejectedFile, Rejection, ValidationResult, ValidationRules};

/// Validate a single file against a rule set.
///
/// The extension is checked before the size, and comparison is
/// case-insensitive. The size check is strict: a file of exactly
/// `max_size_bytes` passes.
pub fn validate(file: &CandidateFile, rules: &ValidationRules) -> ValidationResult {
    let extension = file.extension().ok_or(Rejection::NoExtension)?;

    if !rules.allows_extension(&extension) {
        return Err(Rejection::UnsupportedExtension {
            extension,
            allowed: rules.allowed_list(),
        });
    }

    if file.size_bytes > rules.max_size_bytes {
        return Err(Rejection::TooLarge {
            actual_size: file.size_bytes,
            max_size: rules.max_size_bytes,
        });
    }

    Ok(())
}

/// Split a batch of dropped files into accepted and rejected, preserving order.
pub fn partition(files: Vec<CandidateFile>, rules: &ValidationRules) -> Partition {
    let mut result = Partition::default();

    for file in files {
        match validate(&file, rules) {
            Ok(()) => result.accepted.push(file),
            Err(reason) => result.rejected.push(RejectedFile {
                name: file.name,
                reason,
            }),
        }
    }

    result
}

/// Format a byte count for messages (e.g. "1.5 MB").
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b >= GB {
        format!("{:.1} GB", b / GB)
    } else if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}
