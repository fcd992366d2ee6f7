//! The set of files a user has selected for one converter kind.

use std::collections::HashSet;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error};

use crate::converter::ConverterKind;
use crate::file::{FileId, FileStatus, FileView, ManagedFile, TransitionError};

use super::types::{OrchestratorError, QueueEvent};

#[derive(Default)]
struct QueueInner {
    /// Insertion order is display order.
    files: Vec<ManagedFile>,
    /// Files owned by a running batch.
    claimed: HashSet<FileId>,
}

/// Ordered collection of managed files.
///
/// Every change replaces exactly one entry, matched by id, so lifecycles of
/// different files never overwrite each other. Each change is published as a
/// [`QueueEvent`].
pub struct FileQueue {
    kind: ConverterKind,
    inner: RwLock<QueueInner>,
    events: broadcast::Sender<QueueEvent>,
}

impl FileQueue {
    pub fn new(kind: ConverterKind, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            kind,
            inner: RwLock::new(QueueInner::default()),
            events,
        }
    }

    pub fn kind(&self) -> ConverterKind {
        self.kind
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, event: QueueEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub async fn insert(&self, file: ManagedFile) -> FileView {
        let view = file.view();
        self.inner.write().await.files.push(file);
        debug!(kind = %self.kind, file_id = %view.id, name = %view.name, "File queued");
        self.publish(QueueEvent::FileAdded {
            kind: self.kind,
            file: view.clone(),
        });
        view
    }

    pub async fn list(&self) -> Vec<FileView> {
        self.inner.read().await.files.iter().map(ManagedFile::view).collect()
    }

    pub async fn get(&self, id: FileId) -> Option<ManagedFile> {
        self.inner
            .read()
            .await
            .files
            .iter()
            .find(|f| f.id() == id)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.files.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Pending files not yet owned by a batch.
    pub async fn pending_count(&self) -> usize {
        let inner = self.inner.read().await;
        inner
            .files
            .iter()
            .filter(|f| f.status() == FileStatus::Pending && !inner.claimed.contains(&f.id()))
            .count()
    }

    /// Atomically claim every unclaimed pending file, in queue order.
    ///
    /// A claimed file is skipped by later claims and cannot be removed until
    /// released, so no file is ever submitted twice.
    pub async fn claim_pending(&self) -> Vec<FileId> {
        let mut inner = self.inner.write().await;
        let ids: Vec<FileId> = inner
            .files
            .iter()
            .filter(|f| f.status() == FileStatus::Pending && !inner.claimed.contains(&f.id()))
            .map(ManagedFile::id)
            .collect();
        inner.claimed.extend(ids.iter().copied());
        ids
    }

    pub async fn release(&self, id: FileId) {
        self.inner.write().await.claimed.remove(&id);
    }

    pub async fn is_claimed(&self, id: FileId) -> bool {
        self.inner.read().await.claimed.contains(&id)
    }

    /// Replace the file matching `id` with the result of `transition`.
    pub async fn update<F>(&self, id: FileId, transition: F) -> Result<ManagedFile, OrchestratorError>
    where
        F: FnOnce(&ManagedFile) -> Result<ManagedFile, TransitionError>,
    {
        let updated = {
            let mut inner = self.inner.write().await;
            let slot = inner
                .files
                .iter_mut()
                .find(|f| f.id() == id)
                .ok_or(OrchestratorError::NotFound(id))?;

            let next = transition(slot)?;
            if let Err(violation) = next.check_invariants() {
                error!(file_id = %id, violation = %violation, "File invariant violated");
                debug_assert!(false, "file invariant violated: {}", violation);
            }
            *slot = next.clone();
            next
        };

        self.publish(QueueEvent::FileUpdated {
            kind: self.kind,
            file: updated.view(),
        });
        Ok(updated)
    }

    /// Remove one pending or errored file.
    pub async fn remove(&self, id: FileId) -> Result<ManagedFile, OrchestratorError> {
        let removed = {
            let mut inner = self.inner.write().await;
            let index = inner
                .files
                .iter()
                .position(|f| f.id() == id)
                .ok_or(OrchestratorError::NotFound(id))?;

            let file = &inner.files[index];
            if !file.is_removable() || inner.claimed.contains(&id) {
                return Err(OrchestratorError::NotRemovable {
                    file_id: id,
                    status: file.status(),
                });
            }
            inner.files.remove(index)
        };

        debug!(kind = %self.kind, file_id = %id, "File removed");
        self.publish(QueueEvent::FileRemoved {
            kind: self.kind,
            file_id: id,
        });
        Ok(removed)
    }

    /// Remove every file that has no job in flight. Returns the removed ids.
    pub async fn clear(&self) -> Vec<FileId> {
        let removed: Vec<FileId> = {
            let mut inner = self.inner.write().await;
            let QueueInner { files, claimed } = &mut *inner;

            let mut removed = Vec::new();
            files.retain(|f| {
                let in_flight = claimed.contains(&f.id())
                    || matches!(f.status(), FileStatus::Uploading | FileStatus::Processing);
                if !in_flight {
                    removed.push(f.id());
                }
                in_flight
            });
            removed
        };

        for file_id in &removed {
            self.publish(QueueEvent::FileRemoved {
                kind: self.kind,
                file_id: *file_id,
            });
        }
        removed
    }
}
