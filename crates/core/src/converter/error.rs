//! Error types for the converter module.

use thiserror::Error;

/// Conversion parameters that cannot be sent as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    /// A parameter the converter kind requires was absent or blank.
    #[error("missing required parameter: {field}")]
    Missing { field: &'static str },
}
