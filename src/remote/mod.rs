//! The remote task collection.
//!
//! The core consumes the server as four operations behind the [`TaskRemote`]
//! trait. Every operation returns a boxed `'static` future so implementations
//! can be shared behind `Arc<dyn TaskRemote>` and the futures can outlive the
//! borrow of the remote that produced them.
//!
//! - [`HttpTaskRemote`]: REST transport over `reqwest` (feature `http`)
//! - [`InMemoryTaskRemote`]: simulated server with failure and latency
//!   injection, used by tests and demos

#[cfg(feature = "http")]
pub mod http;
pub mod in_memory;

use futures::future::BoxFuture;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{NewTask, Task, TaskId, TaskPatch};

#[cfg(feature = "http")]
pub use http::HttpTaskRemote;
pub use in_memory::InMemoryTaskRemote;

// =============================================================================
// Remote Error
// =============================================================================

/// Errors reported by a remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The connection could not be established or was interrupted.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The transport gave up waiting for a response.
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// The server answered with a non-success status.
    #[error("Server responded with HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Human-readable `message` from a structured error body, if any.
        message: Option<String>,
    },

    /// The response body could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Creates a status error carrying a structured server message.
    #[must_use]
    pub fn with_message(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: Some(message.into()),
        }
    }

    /// Returns the server-provided message, if the server sent a non-blank one.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => Some(message),
            _ => None,
        }
    }

    /// Returns the HTTP status code for status errors.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Structured error body: `{"message": "..."}`. Other fields are ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub(crate) message: Option<String>,
}

impl ErrorBody {
    /// Extracts the `message` field from a raw response body.
    pub(crate) fn message_from(body: &str) -> Option<String> {
        serde_json::from_str::<Self>(body)
            .ok()
            .and_then(|error_body| error_body.message)
    }
}

// =============================================================================
// Requests
// =============================================================================

/// The four operations of the remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOperation {
    /// Fetch the whole collection.
    Fetch,
    /// Create a task.
    Create,
    /// Update a task.
    Update,
    /// Delete a task.
    Delete,
}

/// An update sent to the server.
///
/// `merged` is the optimistic record (the cached entry with `patch` applied)
/// when the identifier was cached at submission time. Transports whose update
/// endpoint replaces the whole record send it instead of the bare patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    /// Identifier of the task to update.
    pub id: TaskId,
    /// Fields to change.
    pub patch: TaskPatch,
    /// Full record after the patch, if known.
    pub merged: Option<Task>,
}

// =============================================================================
// Task Remote Trait
// =============================================================================

/// Future returned by every remote operation.
pub type RemoteFuture<T> = BoxFuture<'static, Result<T, RemoteError>>;

/// The remote task collection.
///
/// Implementations perform no retries; a failure is reported once through
/// the returned future.
pub trait TaskRemote: Send + Sync {
    /// Fetches the whole collection in server order.
    fn fetch_all(&self) -> RemoteFuture<Vec<Task>>;

    /// Creates a task and returns it with its server-assigned identifier.
    fn create(&self, task: NewTask) -> RemoteFuture<Task>;

    /// Updates a task and returns the stored record.
    fn update(&self, request: UpdateRequest) -> RemoteFuture<Task>;

    /// Deletes a task.
    fn delete(&self, id: TaskId) -> RemoteFuture<()>;

    /// Returns a short name for logging.
    fn source_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_server_message_ignores_blank_messages() {
        assert_eq!(
            RemoteError::with_message(400, "Title too long").server_message(),
            Some("Title too long")
        );
        assert_eq!(RemoteError::with_message(400, "  ").server_message(), None);
        assert_eq!(RemoteError::Timeout(100).server_message(), None);
    }

    #[rstest]
    #[case(r#"{"message":"Boom","code":"X"}"#, Some("Boom"))]
    #[case(r#"{"error":"Boom"}"#, None)]
    #[case("<html>oops</html>", None)]
    #[case("", None)]
    fn test_error_body_message_extraction(#[case] body: &str, #[case] expected: Option<&str>) {
        assert_eq!(ErrorBody::message_from(body).as_deref(), expected);
    }
}
