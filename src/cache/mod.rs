//! Client-side cache of the task collection.
//!
//! - [`CollectionStore`]: the cached collection with its fetch lifecycle
//! - [`CacheSnapshot`]: immutable state published at every settle point
//! - [`Subscription`]: callback registration handle

mod snapshot;
mod store;
mod subscription;

pub use snapshot::{CacheSnapshot, EntriesSnapshot, LOAD_FAILED_MESSAGE};
pub use store::{CollectionStore, FetchOutcome, FetchTicket};
pub use subscription::Subscription;
