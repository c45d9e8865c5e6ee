//! # taskboard
//!
//! Client core for a remote task collection: a local cache of the
//! collection, optimistic create/update/delete with rollback, and the
//! filtered and sorted view shown to the user.
//!
//! ## Overview
//!
//! - **Domain**: [`Task`](domain::Task), create and update payloads, the
//!   [`FilterSpec`](domain::FilterSpec) and completion statistics
//! - **Cache**: [`CollectionStore`](cache::CollectionStore), the single cached
//!   copy of the collection, with snapshots, fetch cancellation and
//!   subscriptions
//! - **Coordinator**: [`MutationCoordinator`](coordinator::MutationCoordinator)
//!   applies mutations optimistically and reconciles them with the server
//! - **View**: [`compute`](view::compute) derives the visible ordering
//! - **Remote**: the [`TaskRemote`](remote::TaskRemote) trait with REST and
//!   in-memory implementations
//! - **Preferences** and **Config**: persisted filters and theme, and
//!   environment-driven settings
//!
//! ## Feature Flags
//!
//! - `http`: REST transport over `reqwest`
//! - `cli`: the `taskboard` command-line binary
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use taskboard::prelude::*;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let remote = Arc::new(InMemoryTaskRemote::with_tasks(vec![
//!     Task::new(TaskId::new(1), "A"),
//! ]));
//! let store = Arc::new(CollectionStore::new());
//! let coordinator = MutationCoordinator::new(Arc::clone(&store), remote, CoordinatorOptions::default());
//! coordinator.refresh().await.unwrap();
//!
//! let pending = coordinator.update(TaskId::new(1), TaskPatch::status(TaskStatus::Completed));
//! assert!(store.get().entries()[0].is_completed());
//! pending.await.unwrap();
//!
//! let snapshot = store.get();
//! let visible = compute(snapshot.entries(), &FilterSpec::default());
//! assert_eq!(visible.len(), 1);
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Note: Disabling redundant_closure_for_method_calls due to clippy 0.1.92 panic bug
#![allow(clippy::redundant_closure_for_method_calls)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types and traits.
///
/// # Usage
///
/// ```rust
/// use taskboard::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cache::{CacheSnapshot, CollectionStore, FetchOutcome, Subscription};
    pub use crate::coordinator::{
        ConcurrencyPolicy, CoordinatorOptions, MutationCoordinator, MutationError, MutationKind,
        RefetchPolicy,
    };
    pub use crate::domain::{
        CompletionFilter, CompletionStats, FilterSpec, NewTask, Priority, PriorityFilter,
        SortOrder, Task, TaskId, TaskPatch, TaskStatus,
    };
    #[cfg(feature = "http")]
    pub use crate::remote::HttpTaskRemote;
    pub use crate::remote::{InMemoryTaskRemote, RemoteError, TaskRemote};
    pub use crate::view::{compute, format_due_date};
}

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod preferences;
pub mod remote;
pub mod view;
