//! Turning completed jobs into retrievable artifacts.

mod resolver;

pub use resolver::{Artifact, DownloadError, DownloadResolver, ResolvedArtifact};
