//! Per-file data model.
//!
//! A [`ManagedFile`] is one user-selected file under orchestration. Every
//! state change produces a new value (see [`ManagedFile::mark_submitted`],
//! [`ManagedFile::apply_snapshot`] and [`ManagedFile::mark_failed`]), which
//! the queue swaps in place of the entry with the same [`FileId`].

mod ids;
mod managed;
mod snapshot;

pub use ids::{FileId, JobId};
pub use managed::{FailureKind, FileStatus, FileView, ManagedFile, TransitionError, SUBMITTED_PROGRESS};
pub use snapshot::{JobStatusSnapshot, RemoteJobState};
