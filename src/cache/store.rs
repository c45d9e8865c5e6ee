//! The collection store.
//!
//! [`CollectionStore`] holds the single cached copy of the task collection.
//! Readers load the published [`CacheSnapshot`] without locking; writers are
//! serialized by one reentrant lock that stays held until every subscriber has
//! been notified, so observers see revisions in order. A write made from inside
//! a callback is queued and delivered once the current notification finishes.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::ReentrantMutex;
use rustc_hash::FxHashSet;
use static_assertions::assert_impl_all;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::snapshot::{CacheSnapshot, EntriesSnapshot};
use super::subscription::{SubscriberRegistry, Subscription};
use crate::domain::{Task, TaskId};
use crate::remote::RemoteError;

// =============================================================================
// Fetch Tickets
// =============================================================================

/// Proof that a fetch was started through [`CollectionStore::begin_fetch`].
///
/// A ticket is superseded by the next `begin_fetch` and invalidated by
/// [`CollectionStore::cancel_fetch`]; results delivered with a stale ticket are
/// discarded.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    generation: u64,
    token: CancellationToken,
}

impl FetchTicket {
    /// Returns the token cancelled when this fetch stops being current.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns `true` once the fetch has been cancelled or superseded.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// What happened to the result of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The result was written to the cache.
    Applied,
    /// The fetch was cancelled and its result discarded.
    Cancelled,
}

#[derive(Debug, Default)]
struct WriterState {
    generation: u64,
    in_flight: Option<FetchTicket>,
    notifying: bool,
    queued: VecDeque<Arc<CacheSnapshot>>,
}

impl WriterState {
    fn is_current(&self, ticket: &FetchTicket) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|current| current.generation == ticket.generation)
    }
}

// =============================================================================
// Collection Store
// =============================================================================

/// Client-side cache of the task collection.
///
/// # Notification
///
/// Every operation documented as notifying publishes a new snapshot and then
/// calls each subscriber synchronously, before returning. Callbacks may read
/// the store and may write to it; such a write publishes immediately but is
/// delivered to subscribers after the notification in progress.
///
/// # Examples
///
/// ```rust
/// use taskboard::cache::CollectionStore;
/// use taskboard::domain::{Task, TaskId};
///
/// let store = CollectionStore::new();
/// store.replace(vec![Task::new(TaskId::new(1), "Write report")]);
///
/// let saved = store.snapshot();
/// store.append(Task::new(TaskId::new(-1), "Draft"));
/// assert_eq!(store.get().len(), 2);
///
/// store.restore(saved);
/// assert_eq!(store.get().len(), 1);
/// ```
#[derive(Debug)]
pub struct CollectionStore {
    state: ArcSwap<CacheSnapshot>,
    writer: ReentrantMutex<RefCell<WriterState>>,
    subscribers: Arc<SubscriberRegistry>,
    watch: watch::Sender<Arc<CacheSnapshot>>,
}

assert_impl_all!(CollectionStore: Send, Sync);

impl CollectionStore {
    /// Creates an empty, not yet loaded store.
    #[must_use]
    pub fn new() -> Self {
        let initial = Arc::new(CacheSnapshot::empty());
        let (watch, _) = watch::channel(Arc::clone(&initial));
        Self {
            state: ArcSwap::new(initial),
            writer: ReentrantMutex::new(RefCell::new(WriterState::default())),
            subscribers: Arc::new(SubscriberRegistry::default()),
            watch,
        }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Returns the current snapshot.
    #[must_use]
    pub fn get(&self) -> Arc<CacheSnapshot> {
        self.state.load_full()
    }

    /// Captures the current entries for a later [`restore`](Self::restore).
    #[must_use]
    pub fn snapshot(&self) -> EntriesSnapshot {
        EntriesSnapshot(self.state.load().shared_entries())
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Replaces all entries and notifies.
    ///
    /// Duplicate identifiers keep their first occurrence.
    pub fn replace(&self, entries: Vec<Task>) {
        let entries = unique_by_id(entries);
        self.commit(|_, current| Some(current.with_entries(entries)));
    }

    /// Appends `task` and notifies. A cached task with the same identifier is
    /// replaced in place instead.
    pub fn append(&self, task: Task) {
        self.commit(|_, current| {
            let mut entries = current.entries().to_vec();
            match entries.iter_mut().find(|cached| cached.id == task.id) {
                Some(cached) => *cached = task,
                None => entries.push(task),
            }
            Some(current.with_entries(entries.into()))
        });
    }

    /// Rewrites every entry matching `predicate` with `transform` and notifies.
    ///
    /// A transform returning `None` removes the entry. A returned task keeps
    /// the identifier of the entry it replaces. Returns the number of matched
    /// entries; nothing is notified when it is zero.
    pub fn patch<P, F>(&self, predicate: P, mut transform: F) -> usize
    where
        P: Fn(&Task) -> bool,
        F: FnMut(&Task) -> Option<Task>,
    {
        let mut matched = 0;
        self.commit(|_, current| {
            let mut entries = Vec::with_capacity(current.len());
            for task in current.entries() {
                if predicate(task) {
                    matched += 1;
                    if let Some(mut rewritten) = transform(task) {
                        rewritten.id = task.id;
                        entries.push(rewritten);
                    }
                } else {
                    entries.push(task.clone());
                }
            }
            (matched > 0).then(|| current.with_entries(entries.into()))
        });
        matched
    }

    /// Removes the entry with identifier `id`. Returns `true` if it was cached.
    pub fn remove(&self, id: TaskId) -> bool {
        self.patch(|task| task.id == id, |_| None) > 0
    }

    /// Swaps the optimistic entry `placeholder` for the authoritative `task`
    /// at the same position and notifies.
    ///
    /// When `task` is already cached under its own identifier the placeholder
    /// is dropped instead. Returns `false` without notifying when the
    /// placeholder is no longer cached.
    pub fn reconcile(&self, placeholder: TaskId, task: Task) -> bool {
        self.commit(|_, current| {
            let position = current
                .entries()
                .iter()
                .position(|cached| cached.id == placeholder)?;
            let mut entries = current.entries().to_vec();
            if current.contains(task.id) {
                entries.remove(position);
            } else {
                entries[position] = task;
            }
            Some(current.with_entries(entries.into()))
        })
    }

    /// Puts back entries captured by [`snapshot`](Self::snapshot) and
    /// notifies. Loading state and fetch errors are left as they are.
    pub fn restore(&self, snapshot: EntriesSnapshot) {
        self.commit(|_, current| Some(current.with_entries(snapshot.0)));
    }

    // -------------------------------------------------------------------------
    // Fetch lifecycle
    // -------------------------------------------------------------------------

    /// Marks a fetch as in flight and notifies. Any fetch already in flight is
    /// cancelled.
    pub fn begin_fetch(&self) -> FetchTicket {
        let token = CancellationToken::new();
        let mut generation = 0;
        self.commit(|writer, current| {
            if let Some(previous) = writer.in_flight.take() {
                previous.token.cancel();
            }
            writer.generation += 1;
            generation = writer.generation;
            writer.in_flight = Some(FetchTicket {
                generation,
                token: token.clone(),
            });
            Some(current.with_loading(true))
        });
        FetchTicket { generation, token }
    }

    /// Writes the result of the fetch identified by `ticket`.
    ///
    /// On success the entries are replaced and any earlier error cleared; on
    /// failure the entries are kept and the error recorded. Results of a
    /// cancelled or superseded fetch are discarded without notification.
    pub fn finish_fetch(
        &self,
        ticket: &FetchTicket,
        result: Result<Vec<Task>, RemoteError>,
    ) -> FetchOutcome {
        let applied = self.commit(|writer, current| {
            if ticket.is_cancelled() || !writer.is_current(ticket) {
                return None;
            }
            writer.in_flight = None;
            Some(match result {
                Ok(entries) => current.fetched(unique_by_id(entries)),
                Err(error) => current.fetch_failed(error),
            })
        });
        if applied {
            FetchOutcome::Applied
        } else {
            tracing::debug!("Discarding result of a cancelled fetch");
            FetchOutcome::Cancelled
        }
    }

    /// Cancels the fetch in flight, if any. Notifies only when a fetch was
    /// actually cancelled.
    pub fn cancel_fetch(&self) -> bool {
        self.commit(|writer, current| {
            let ticket = writer.in_flight.take()?;
            ticket.token.cancel();
            tracing::debug!("Cancelled in-flight fetch");
            Some(current.with_loading(false))
        })
    }

    /// Gives up the fetch identified by `ticket` without a result.
    ///
    /// Clears `loading` and notifies when `ticket` is still the fetch in
    /// flight; otherwise does nothing.
    pub fn abandon_fetch(&self, ticket: &FetchTicket) -> bool {
        self.commit(|writer, current| {
            if !writer.is_current(ticket) {
                return None;
            }
            writer.in_flight = None;
            ticket.token.cancel();
            tracing::debug!("Abandoned in-flight fetch");
            Some(current.with_loading(false))
        })
    }

    // -------------------------------------------------------------------------
    // Observation
    // -------------------------------------------------------------------------

    /// Registers `callback` to run after every notification.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&CacheSnapshot) + Send + Sync + 'static,
    {
        self.subscribers.register(callback)
    }

    /// Returns a receiver that always holds the latest snapshot.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Arc<CacheSnapshot>> {
        self.watch.subscribe()
    }

    /// Returns the number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Runs `update` under the writer lock and publishes its result.
    ///
    /// Returns `false` without notifying when `update` returns `None`.
    fn commit<F>(&self, update: F) -> bool
    where
        F: FnOnce(&mut WriterState, &CacheSnapshot) -> Option<CacheSnapshot>,
    {
        let writer = self.writer.lock();
        let next = {
            let mut state = writer.borrow_mut();
            let current = self.state.load_full();
            let Some(next) = update(&mut state, &current) else {
                return false;
            };
            let next = Arc::new(next.with_revision(current.revision() + 1));
            self.state.store(Arc::clone(&next));
            self.watch.send_replace(Arc::clone(&next));
            if state.notifying {
                // Written from a callback on this thread.
                state.queued.push_back(next);
                return true;
            }
            state.notifying = true;
            next
        };
        let delivery = Delivery { writer: &writer };
        delivery.run(&self.subscribers, next);
        true
    }
}

/// Delivers a snapshot and everything queued behind it, in revision order.
///
/// Resets the notifying flag even when a callback panics.
struct Delivery<'a> {
    writer: &'a RefCell<WriterState>,
}

impl Delivery<'_> {
    fn run(&self, subscribers: &SubscriberRegistry, first: Arc<CacheSnapshot>) {
        let mut next = Some(first);
        while let Some(snapshot) = next {
            subscribers.notify(&snapshot);
            next = self.writer.borrow_mut().queued.pop_front();
        }
    }
}

impl Drop for Delivery<'_> {
    fn drop(&mut self) {
        let mut state = self.writer.borrow_mut();
        state.notifying = false;
        state.queued.clear();
    }
}

impl Default for CollectionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Drops every task whose identifier already occurred earlier in `entries`.
fn unique_by_id(entries: Vec<Task>) -> Arc<[Task]> {
    let mut seen = FxHashSet::default();
    let total = entries.len();
    let unique: Vec<Task> = entries
        .into_iter()
        .filter(|task| seen.insert(task.id))
        .collect();
    if unique.len() != total {
        tracing::warn!(
            dropped = total - unique.len(),
            "Dropping tasks with duplicate identifiers"
        );
    }
    unique.into()
}
