//! Mutation coordinator.
//!
//! Every mutation runs the same sequence:
//!
//! 1. cancel the refetch in flight, so stale server data cannot overwrite the
//!    optimistic change
//! 2. capture the cached entries for rollback
//! 3. apply the optimistic change and notify
//! 4. call the remote
//! 5. commit on success, or restore the captured entries on failure
//! 6. refetch, as configured by [`RefetchPolicy`]
//!
//! Steps 1 to 4 happen synchronously when the mutation method is called, so a
//! read right after the call already observes the optimistic state. The
//! returned future drives step 5 and resolves as soon as the cache has
//! settled; the refetch of step 6 is spawned on the current Tokio runtime and
//! does not delay the result.
//!
//! Dropping the returned future before it resolves abandons the mutation: the
//! optimistic change is rolled back as if the remote call had failed.

mod error;

pub use error::{MutationError, MutationKind};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::cache::{CollectionStore, EntriesSnapshot, FetchOutcome, FetchTicket};
use crate::domain::{NewTask, OptimisticIds, Task, TaskId, TaskPatch};
use crate::remote::{RemoteError, TaskRemote, UpdateRequest};

// =============================================================================
// Options
// =============================================================================

/// When to refetch the collection after a mutation settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RefetchPolicy {
    /// After every settlement, successful or not.
    #[default]
    AfterSettlement,
    /// Only after a successful mutation.
    OnSuccess,
    /// Never; the cache keeps the committed optimistic state.
    Never,
}

impl RefetchPolicy {
    /// Returns `true` if a mutation that settled with `succeeded` refetches.
    #[must_use]
    pub const fn refetches(self, succeeded: bool) -> bool {
        match self {
            Self::AfterSettlement => true,
            Self::OnSuccess => succeeded,
            Self::Never => false,
        }
    }
}

/// How concurrent mutations of the same task interact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConcurrencyPolicy {
    /// Each mutation settles independently; the last settlement wins.
    #[default]
    Unserialized,
    /// Only the most recently submitted mutation of a task may settle on the
    /// cache. Earlier ones are reported to their callers but neither commit,
    /// roll back nor refetch.
    LatestWins,
}

/// Coordinator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CoordinatorOptions {
    /// Refetch behavior after settlement.
    pub refetch: RefetchPolicy,
    /// Same-task concurrency behavior.
    pub concurrency: ConcurrencyPolicy,
}

impl CoordinatorOptions {
    /// Returns new options with the given refetch policy.
    #[must_use]
    pub const fn with_refetch(self, refetch: RefetchPolicy) -> Self {
        Self { refetch, ..self }
    }

    /// Returns new options with the given concurrency policy.
    #[must_use]
    pub const fn with_concurrency(self, concurrency: ConcurrencyPolicy) -> Self {
        Self {
            concurrency,
            ..self
        }
    }
}

// =============================================================================
// Pending Mutation
// =============================================================================

/// State carried from submission to settlement of one mutation.
///
/// Rolls the optimistic change back when dropped unsettled.
struct PendingMutation<'a> {
    coordinator: &'a MutationCoordinator,
    kind: MutationKind,
    id: TaskId,
    /// Taken on settlement.
    previous: Option<EntriesSnapshot>,
    sequence: Option<u64>,
}

impl PendingMutation<'_> {
    fn settle<T, C>(
        mut self,
        result: Result<T, RemoteError>,
        commit: C,
    ) -> Result<T, MutationError>
    where
        C: FnOnce(&CollectionStore, &T),
    {
        let coordinator = self.coordinator;
        let (kind, id) = (self.kind, self.id);
        let previous = self.previous.take();

        if !coordinator.retire(id, self.sequence) {
            tracing::debug!(
                kind = %kind,
                id = %id,
                "Discarding settlement superseded by a later mutation"
            );
            return result.map_err(|error| MutationError::new(kind, error));
        }

        let outcome = match result {
            Ok(value) => {
                commit(&coordinator.store, &value);
                tracing::debug!(kind = %kind, id = %id, "Committed mutation");
                Ok(value)
            }
            Err(error) => {
                if let Some(previous) = previous {
                    coordinator.store.restore(previous);
                }
                tracing::warn!(
                    kind = %kind,
                    id = %id,
                    error = %error,
                    "Mutation failed, rolled back optimistic change"
                );
                Err(MutationError::new(kind, error))
            }
        };

        if coordinator.options.refetch.refetches(outcome.is_ok()) {
            coordinator.schedule_refetch(kind);
        }
        outcome
    }
}

impl Drop for PendingMutation<'_> {
    fn drop(&mut self) {
        let Some(previous) = self.previous.take() else {
            return;
        };
        let coordinator = self.coordinator;
        if !coordinator.retire(self.id, self.sequence) {
            return;
        }
        coordinator.store.restore(previous);
        tracing::warn!(
            kind = %self.kind,
            id = %self.id,
            "Mutation dropped before settling, rolled back optimistic change"
        );
        if coordinator.options.refetch.refetches(false) {
            coordinator.schedule_refetch(self.kind);
        }
    }
}

/// Clears the loading state of a fetch dropped before it finished.
struct FetchGuard {
    store: Arc<CollectionStore>,
    ticket: FetchTicket,
    finished: bool,
}

impl FetchGuard {
    fn finish(&mut self, result: Result<Vec<Task>, RemoteError>) -> FetchOutcome {
        self.finished = true;
        self.store.finish_fetch(&self.ticket, result)
    }
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.store.abandon_fetch(&self.ticket);
        }
    }
}

/// Latest sequence number issued per task, for [`ConcurrencyPolicy::LatestWins`].
#[derive(Debug, Default)]
struct Sequencer {
    next: AtomicU64,
    latest: Mutex<FxHashMap<TaskId, u64>>,
}

impl Sequencer {
    fn issue(&self, id: TaskId) -> u64 {
        let sequence = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        self.latest.lock().insert(id, sequence);
        sequence
    }

    /// Returns `true` if `sequence` is the latest for `id`, and retires it.
    fn settle(&self, id: TaskId, sequence: u64) -> bool {
        let mut latest = self.latest.lock();
        if latest.get(&id) == Some(&sequence) {
            latest.remove(&id);
            true
        } else {
            false
        }
    }
}

// =============================================================================
// Mutation Coordinator
// =============================================================================

/// Turns task intents into optimistic cache changes and remote calls.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
///
/// use taskboard::cache::CollectionStore;
/// use taskboard::coordinator::{CoordinatorOptions, MutationCoordinator};
/// use taskboard::domain::NewTask;
/// use taskboard::remote::InMemoryTaskRemote;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let store = Arc::new(CollectionStore::new());
/// let remote = Arc::new(InMemoryTaskRemote::new());
/// let coordinator = MutationCoordinator::new(Arc::clone(&store), remote, CoordinatorOptions::default());
///
/// let pending = coordinator.create(NewTask::new("Buy milk"));
/// // Visible before the remote call resolves.
/// assert!(store.get().entries()[0].is_optimistic());
///
/// let created = pending.await.unwrap();
/// assert_eq!(store.get().entries()[0].id, created.id);
/// # });
/// ```
pub struct MutationCoordinator {
    store: Arc<CollectionStore>,
    remote: Arc<dyn TaskRemote>,
    options: CoordinatorOptions,
    ids: OptimisticIds,
    sequencer: Sequencer,
}

impl std::fmt::Debug for MutationCoordinator {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("MutationCoordinator")
            .field("remote", &self.remote.source_name())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl MutationCoordinator {
    /// Creates a coordinator writing to `store` and calling `remote`.
    #[must_use]
    pub fn new(
        store: Arc<CollectionStore>,
        remote: Arc<dyn TaskRemote>,
        options: CoordinatorOptions,
    ) -> Self {
        Self {
            store,
            remote,
            options,
            ids: OptimisticIds::new(),
            sequencer: Sequencer::default(),
        }
    }

    /// Returns the store this coordinator writes to.
    #[must_use]
    pub const fn store(&self) -> &Arc<CollectionStore> {
        &self.store
    }

    /// Returns the configured options.
    #[must_use]
    pub const fn options(&self) -> CoordinatorOptions {
        self.options
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Creates a task.
    ///
    /// The task is appended immediately under an optimistic identifier. On
    /// success the placeholder is swapped for the server's record.
    ///
    /// `task` is not validated here; see [`NewTask::validate`].
    pub fn create(
        &self,
        task: NewTask,
    ) -> impl Future<Output = Result<Task, MutationError>> + Send + '_ {
        let placeholder = self.ids.allocate();
        let pending = self.begin(MutationKind::Create, placeholder);
        self.store.append(task.clone().into_task(placeholder));
        tracing::debug!(id = %placeholder, "Applied optimistic create");

        let call = self.remote.create(task);
        async move {
            let result = call.await;
            pending.settle(result, |store, created: &Task| {
                store.reconcile(placeholder, created.clone());
            })
        }
    }

    /// Updates the task with identifier `id`.
    ///
    /// If the task is not cached nothing is applied optimistically, but the
    /// remote call is still made. On success the cached entry is replaced by
    /// the server's record.
    pub fn update(
        &self,
        id: TaskId,
        patch: TaskPatch,
    ) -> impl Future<Output = Result<Task, MutationError>> + Send + '_ {
        let pending = self.begin(MutationKind::Update, id);
        let mut merged = None;
        self.store.patch(
            |task| task.id == id,
            |task| {
                let next = patch.apply(task);
                merged = Some(next.clone());
                Some(next)
            },
        );
        if merged.is_some() {
            tracing::debug!(id = %id, "Applied optimistic update");
        } else {
            tracing::debug!(id = %id, "Updating a task that is not cached");
        }

        let call = self.remote.update(UpdateRequest { id, patch, merged });
        async move {
            let result = call.await;
            pending.settle(result, move |store, updated: &Task| {
                store.patch(|task| task.id == id, |_| Some(updated.clone()));
            })
        }
    }

    /// Deletes the task with identifier `id`.
    pub fn delete(
        &self,
        id: TaskId,
    ) -> impl Future<Output = Result<(), MutationError>> + Send + '_ {
        let pending = self.begin(MutationKind::Delete, id);
        if self.store.remove(id) {
            tracing::debug!(id = %id, "Applied optimistic delete");
        }

        let call = self.remote.delete(id);
        async move {
            let result = call.await;
            pending.settle(result, |_, _| {})
        }
    }

    // -------------------------------------------------------------------------
    // Refetch
    // -------------------------------------------------------------------------

    /// Fetches the collection and replaces the cached entries.
    ///
    /// The fetch starts when this is called. The returned future resolves to
    /// [`FetchOutcome::Cancelled`] as soon as the fetch is cancelled by a
    /// mutation or superseded by another refresh. A failed fetch keeps the
    /// cached entries and is recorded on the snapshot as well as returned.
    /// Dropping the future gives the fetch up and clears `loading`.
    ///
    /// # Errors
    ///
    /// Returns the remote error of a fetch that failed while still current.
    pub fn refresh(
        &self,
    ) -> impl Future<Output = Result<FetchOutcome, RemoteError>> + Send + use<> {
        let ticket = self.store.begin_fetch();
        let token = ticket.token().clone();
        let fetch = self.remote.fetch_all();
        tracing::debug!(source = self.remote.source_name(), "Fetching tasks");

        let mut guard = FetchGuard {
            store: Arc::clone(&self.store),
            ticket,
            finished: false,
        };
        async move {
            let result = tokio::select! {
                biased;
                () = token.cancelled() => {
                    tracing::debug!("Fetch cancelled before completion");
                    return Ok(FetchOutcome::Cancelled);
                }
                result = fetch => result,
            };

            let failure = result.as_ref().err().cloned();
            let outcome = guard.finish(result);
            match failure {
                Some(error) if outcome == FetchOutcome::Applied => {
                    tracing::warn!(error = %error, "Fetching tasks failed");
                    Err(error)
                }
                _ => Ok(outcome),
            }
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    fn begin(&self, kind: MutationKind, id: TaskId) -> PendingMutation<'_> {
        self.store.cancel_fetch();
        let sequence = match self.options.concurrency {
            ConcurrencyPolicy::Unserialized => None,
            ConcurrencyPolicy::LatestWins => Some(self.sequencer.issue(id)),
        };
        PendingMutation {
            coordinator: self,
            kind,
            id,
            previous: Some(self.store.snapshot()),
            sequence,
        }
    }

    /// Returns `true` if a mutation holding `sequence` may still settle on
    /// the cache, retiring the sequence number.
    fn retire(&self, id: TaskId, sequence: Option<u64>) -> bool {
        sequence.is_none_or(|sequence| self.sequencer.settle(id, sequence))
    }

    /// Starts a refetch now and lets it finish in the background.
    fn schedule_refetch(&self, kind: MutationKind) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(kind = %kind, "No Tokio runtime to refetch on, skipping refetch");
            return;
        };
        let refresh = self.refresh();
        runtime.spawn(async move {
            if let Err(error) = refresh.await {
                tracing::debug!(kind = %kind, error = %error, "Refetch after mutation failed");
            }
        });
    }
}

static_assertions::assert_impl_all!(MutationCoordinator: Send, Sync);
