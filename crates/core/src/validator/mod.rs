//! Pre-queue file validation.
//!
//! Validation is pure and synchronous: a candidate file's extension and size
//! are checked against a [`ValidationRules`] set before the file is ever
//! handed to the orchestrator. Nothing here touches the network.

mod rules;
mod types;

pub use rules::{format_size, partition, validate};
pub use types::{CandidateFile, Partition, RejectedFile, Rejection, ValidationResult, ValidationRules};
