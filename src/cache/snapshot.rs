//! Immutable views of the cache state.

use std::sync::Arc;

use crate::domain::{Task, TaskId};
use crate::remote::RemoteError;

/// Message shown for a failed fetch when the server sent none.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load tasks.";

/// The state of the collection cache at one settle point.
///
/// Snapshots are immutable; every change to the cache publishes a new one
/// with a higher [`revision`](Self::revision).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSnapshot {
    entries: Arc<[Task]>,
    loading: bool,
    loaded: bool,
    error: Option<RemoteError>,
    revision: u64,
}

impl CacheSnapshot {
    pub(crate) fn empty() -> Self {
        Self {
            entries: Arc::from(Vec::new()),
            loading: false,
            loaded: false,
            error: None,
            revision: 0,
        }
    }

    /// Returns the cached tasks in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[Task] {
        &self.entries
    }

    /// Returns the cached task with identifier `id`.
    #[must_use]
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.entries.iter().find(|task| task.id == id)
    }

    /// Returns `true` if a task with identifier `id` is cached.
    #[must_use]
    pub fn contains(&self, id: TaskId) -> bool {
        self.get(id).is_some()
    }

    /// Returns the number of cached tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no task is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` while a fetch is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// Returns `true` once a fetch has succeeded.
    #[must_use]
    pub const fn has_loaded(&self) -> bool {
        self.loaded
    }

    /// Returns the error of the last fetch, cleared by the next successful one.
    #[must_use]
    pub const fn error(&self) -> Option<&RemoteError> {
        self.error.as_ref()
    }

    /// Returns the message to show for the last fetch error.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_ref()
            .map(|error| error.server_message().unwrap_or(LOAD_FAILED_MESSAGE))
    }

    /// Returns the revision number, incremented on every notification.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn shared_entries(&self) -> Arc<[Task]> {
        Arc::clone(&self.entries)
    }

    // -------------------------------------------------------------------------
    // Successor construction (store only)
    // -------------------------------------------------------------------------

    pub(crate) fn with_entries(&self, entries: Arc<[Task]>) -> Self {
        Self {
            entries,
            ..self.clone()
        }
    }

    pub(crate) fn with_loading(&self, loading: bool) -> Self {
        Self {
            loading,
            ..self.clone()
        }
    }

    pub(crate) fn fetched(&self, entries: Arc<[Task]>) -> Self {
        Self {
            entries,
            loading: false,
            loaded: true,
            error: None,
            revision: self.revision,
        }
    }

    pub(crate) fn fetch_failed(&self, error: RemoteError) -> Self {
        Self {
            loading: false,
            error: Some(error),
            ..self.clone()
        }
    }

    pub(crate) const fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }
}

/// Opaque capture of the cached entries, used to roll a mutation back.
///
/// Taking a snapshot shares the current entry slice; it never copies tasks.
#[derive(Debug, Clone)]
pub struct EntriesSnapshot(pub(crate) Arc<[Task]>);

impl EntriesSnapshot {
    /// Returns the captured entries.
    #[must_use]
    pub fn as_slice(&self) -> &[Task] {
        &self.0
    }

    /// Returns the number of captured entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing was cached when the snapshot was taken.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
