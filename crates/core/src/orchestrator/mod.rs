//! Conversion orchestrator and file queue.
//!
//! One [`ConversionOrchestrator`] exists per converter kind. It owns a
//! [`FileQueue`] of [`ManagedFile`](crate::file::ManagedFile)s and drives
//! them through the state machine:
//! - **Drop**: validate, queue the files that pass, report the rest once
//! - **Batch**: claim pending files, then submit and poll them one at a time
//! - **Download**: resolve or fetch the artifact of a completed file

mod config;
mod queue;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use queue::FileQueue;
pub use runner::ConversionOrchestrator;
pub use types::{BatchReport, ClaimedBatch, DropOutcome, OrchestratorError, QueueEvent};
