//! In-memory remote implementation.
//!
//! [`InMemoryTaskRemote`] behaves like the REST server: it assigns positive
//! identifiers, keeps tasks in insertion order and answers `404` for unknown
//! identifiers. On top of that it supports deterministic failure and latency
//! injection so callers can exercise rollback and cancellation paths.
//!
//! # Timing
//!
//! - A fetch reads the collection when it is called and returns it after the
//!   configured latency, so a slow fetch returns data that may be stale by the
//!   time it arrives.
//! - Mutations wait for the latency first and then apply their change.
//! - Injected failures are decided when the call is made and reported after
//!   the latency; a failed mutation never changes the stored collection.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use super::{RemoteError, RemoteFuture, RemoteOperation, TaskRemote, UpdateRequest};
use crate::domain::{NewTask, Task, TaskId};

// =============================================================================
// Injection State
// =============================================================================

#[derive(Debug, Default)]
struct Injection {
    failures: FxHashMap<RemoteOperation, VecDeque<RemoteError>>,
    latency: FxHashMap<RemoteOperation, Duration>,
}

impl Injection {
    fn take_failure(&mut self, operation: RemoteOperation) -> Option<RemoteError> {
        self.failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
    }

    fn latency(&self, operation: RemoteOperation) -> Duration {
        self.latency
            .get(&operation)
            .copied()
            .unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    fetch: AtomicUsize,
    create: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
}

impl CallCounters {
    const fn counter(&self, operation: RemoteOperation) -> &AtomicUsize {
        match operation {
            RemoteOperation::Fetch => &self.fetch,
            RemoteOperation::Create => &self.create,
            RemoteOperation::Update => &self.update,
            RemoteOperation::Delete => &self.delete,
        }
    }
}

#[derive(Debug)]
struct Server {
    tasks: RwLock<Vec<Task>>,
    next_id: AtomicI64,
    injection: Mutex<Injection>,
    calls: CallCounters,
}

// =============================================================================
// In-Memory Task Remote
// =============================================================================

/// Simulated task server.
///
/// Cloning shares the same server state.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
///
/// use taskboard::domain::{Task, TaskId};
/// use taskboard::remote::{InMemoryTaskRemote, RemoteOperation, TaskRemote};
///
/// let remote = InMemoryTaskRemote::with_tasks(vec![Task::new(TaskId::new(1), "A")]);
/// remote.fail_next(RemoteOperation::Delete, Some("Task is locked"));
/// remote.set_latency(RemoteOperation::Fetch, Duration::from_millis(50));
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let error = remote.delete(TaskId::new(1)).await.unwrap_err();
/// assert_eq!(error.server_message(), Some("Task is locked"));
/// assert_eq!(remote.fetch_all().await.unwrap().len(), 1);
/// assert_eq!(remote.calls(RemoteOperation::Delete), 1);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryTaskRemote {
    server: Arc<Server>,
}

impl InMemoryTaskRemote {
    /// Creates an empty server whose first identifier is `1`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tasks(Vec::new())
    }

    /// Creates a server holding `tasks`. New identifiers continue after the
    /// largest seeded one.
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let next_id = tasks
            .iter()
            .map(|task| task.id.get())
            .max()
            .unwrap_or(0)
            .max(0)
            + 1;
        Self {
            server: Arc::new(Server {
                tasks: RwLock::new(tasks),
                next_id: AtomicI64::new(next_id),
                injection: Mutex::new(Injection::default()),
                calls: CallCounters::default(),
            }),
        }
    }

    /// Returns the stored collection.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.server.tasks.read().clone()
    }

    /// Makes the next call of `operation` fail with HTTP 500, carrying
    /// `message` as the structured server message when given.
    ///
    /// Failures queue up: calling this twice fails the next two calls.
    pub fn fail_next(&self, operation: RemoteOperation, message: Option<&str>) {
        self.fail_next_with(
            operation,
            RemoteError::Status {
                status: 500,
                message: message.map(str::to_string),
            },
        );
    }

    /// Makes the next call of `operation` fail with `error`.
    pub fn fail_next_with(&self, operation: RemoteOperation, error: RemoteError) {
        self.server
            .injection
            .lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Delays every response of `operation` by `latency`.
    pub fn set_latency(&self, operation: RemoteOperation, latency: Duration) {
        self.server
            .injection
            .lock()
            .latency
            .insert(operation, latency);
    }

    /// Returns how many times `operation` has been called.
    #[must_use]
    pub fn calls(&self, operation: RemoteOperation) -> usize {
        self.server.calls.counter(operation).load(Ordering::SeqCst)
    }

    /// Records the call and returns the injected failure and latency for it.
    fn begin(&self, operation: RemoteOperation) -> (Option<RemoteError>, Duration) {
        self.server
            .calls
            .counter(operation)
            .fetch_add(1, Ordering::SeqCst);
        let mut injection = self.server.injection.lock();
        (injection.take_failure(operation), injection.latency(operation))
    }
}

impl Default for InMemoryTaskRemote {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

fn not_found() -> RemoteError {
    RemoteError::Status {
        status: 404,
        message: None,
    }
}

#[allow(clippy::significant_drop_tightening)]
impl TaskRemote for InMemoryTaskRemote {
    fn fetch_all(&self) -> RemoteFuture<Vec<Task>> {
        let (failure, latency) = self.begin(RemoteOperation::Fetch);
        let tasks = self.tasks();
        async move {
            wait(latency).await;
            failure.map_or(Ok(tasks), Err)
        }
        .boxed()
    }

    fn create(&self, task: NewTask) -> RemoteFuture<Task> {
        let (failure, latency) = self.begin(RemoteOperation::Create);
        let server = Arc::clone(&self.server);
        async move {
            wait(latency).await;
            if let Some(error) = failure {
                return Err(error);
            }
            let id = TaskId::new(server.next_id.fetch_add(1, Ordering::SeqCst));
            let created = task.into_task(id);
            server.tasks.write().push(created.clone());
            Ok(created)
        }
        .boxed()
    }

    fn update(&self, request: UpdateRequest) -> RemoteFuture<Task> {
        let (failure, latency) = self.begin(RemoteOperation::Update);
        let server = Arc::clone(&self.server);
        async move {
            wait(latency).await;
            if let Some(error) = failure {
                return Err(error);
            }
            let mut tasks = server.tasks.write();
            let stored = tasks
                .iter_mut()
                .find(|task| task.id == request.id)
                .ok_or_else(not_found)?;
            *stored = request.patch.apply(stored);
            Ok(stored.clone())
        }
        .boxed()
    }

    fn delete(&self, id: TaskId) -> RemoteFuture<()> {
        let (failure, latency) = self.begin(RemoteOperation::Delete);
        let server = Arc::clone(&self.server);
        async move {
            wait(latency).await;
            if let Some(error) = failure {
                return Err(error);
            }
            let mut tasks = server.tasks.write();
            let before = tasks.len();
            tasks.retain(|task| task.id != id);
            if tasks.len() == before {
                Err(not_found())
            } else {
                Ok(())
            }
        }
        .boxed()
    }

    fn source_name(&self) -> &'static str {
        "in_memory"
    }
}

// =============================================================================
// Tests
// =============================================================================
