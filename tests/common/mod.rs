//! Common test helpers for integration tests.
//!
//! # Note
//!
//! The `#![allow(dead_code)]` attribute is necessary because Rust compiles each
//! integration test file as a separate crate, and not every file uses every
//! helper.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;

use taskboard::cache::{CacheSnapshot, CollectionStore, Subscription};
use taskboard::coordinator::{CoordinatorOptions, MutationCoordinator};
use taskboard::domain::{Priority, Task, TaskId, TaskStatus};
use taskboard::remote::InMemoryTaskRemote;

/// A store, a simulated server and a coordinator wired together.
pub struct Harness {
    pub store: Arc<CollectionStore>,
    pub remote: InMemoryTaskRemote,
    pub coordinator: MutationCoordinator,
}

impl Harness {
    pub fn new(tasks: Vec<Task>, options: CoordinatorOptions) -> Self {
        let store = Arc::new(CollectionStore::new());
        let remote = InMemoryTaskRemote::with_tasks(tasks);
        let coordinator =
            MutationCoordinator::new(Arc::clone(&store), Arc::new(remote.clone()), options);
        Self {
            store,
            remote,
            coordinator,
        }
    }

    /// Creates the harness and loads the server's tasks into the cache.
    pub async fn loaded(tasks: Vec<Task>, options: CoordinatorOptions) -> Self {
        let harness = Self::new(tasks, options);
        harness.coordinator.refresh().await.unwrap();
        harness
    }

    /// Waits until no fetch is in flight, such as a refetch spawned after a
    /// mutation settled.
    pub async fn refetched(&self) {
        self.store
            .watch()
            .wait_for(|snapshot| !snapshot.is_loading())
            .await
            .unwrap();
    }

    pub fn entries(&self) -> Vec<Task> {
        self.store.get().entries().to_vec()
    }

    pub fn cached(&self, id: i64) -> Option<Task> {
        self.store.get().get(TaskId::new(id)).cloned()
    }
}

/// Records every snapshot a subscriber receives.
pub struct Recorder {
    pub seen: Arc<Mutex<Vec<Arc<CacheSnapshot>>>>,
    pub subscription: Subscription,
}

impl Recorder {
    pub fn attach(store: &CollectionStore) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = store.subscribe(move |snapshot| {
            sink.lock().push(Arc::new(snapshot.clone()));
        });
        Self { seen, subscription }
    }

    pub fn count(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn revisions(&self) -> Vec<u64> {
        self.seen
            .lock()
            .iter()
            .map(|snapshot| snapshot.revision())
            .collect()
    }
}

pub fn task(id: i64, title: &str) -> Task {
    Task::new(TaskId::new(id), title)
}

pub fn completed(id: i64, title: &str) -> Task {
    task(id, title).with_status(TaskStatus::Completed)
}

pub fn due(id: i64, title: &str, date: Option<NaiveDate>) -> Task {
    task(id, title).with_due_date(date)
}

pub fn prioritized(id: i64, title: &str, priority: Priority) -> Task {
    task(id, title).with_priority(priority)
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn ids(tasks: &[&Task]) -> Vec<i64> {
    tasks.iter().map(|task| task.id.get()).collect()
}
