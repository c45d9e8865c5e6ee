//! Mutation errors.

use std::fmt;

use thiserror::Error;

use crate::remote::RemoteError;

/// The kind of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Task creation.
    Create,
    /// Partial update of one task.
    Update,
    /// Task deletion.
    Delete,
}

impl MutationKind {
    /// Returns the message reported when the server gave none.
    #[must_use]
    pub const fn generic_message(self) -> &'static str {
        match self {
            Self::Create => "Failed to create task.",
            Self::Update => "Failed to update task.",
            Self::Delete => "Failed to delete task.",
        }
    }

    /// Returns the lowercase name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A mutation whose remote call failed.
///
/// By the time this error reaches the caller the cache has already been
/// rolled back to its state before the mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct MutationError {
    /// Which mutation failed.
    pub kind: MutationKind,
    /// User-facing message: the server's message, or a generic one.
    pub message: String,
    /// The underlying remote failure.
    pub source: RemoteError,
}

impl MutationError {
    /// Wraps `source`, choosing the server's message when it sent one.
    #[must_use]
    pub fn new(kind: MutationKind, source: RemoteError) -> Self {
        let message = source
            .server_message()
            .unwrap_or_else(|| kind.generic_message())
            .to_string();
        Self {
            kind,
            message,
            source,
        }
    }

    /// Returns `true` if the server provided the message.
    #[must_use]
    pub fn has_server_message(&self) -> bool {
        self.source.server_message().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(MutationKind::Create, "Failed to create task.")]
    #[case(MutationKind::Update, "Failed to update task.")]
    #[case(MutationKind::Delete, "Failed to delete task.")]
    fn test_generic_message_without_server_message(
        #[case] kind: MutationKind,
        #[case] expected: &str,
    ) {
        let error = MutationError::new(kind, RemoteError::ConnectionFailed("refused".into()));
        assert_eq!(error.message, expected);
        assert_eq!(error.to_string(), expected);
        assert!(!error.has_server_message());
    }

    #[rstest]
    fn test_server_message_is_surfaced_verbatim() {
        let error = MutationError::new(
            MutationKind::Update,
            RemoteError::with_message(409, "Task was modified elsewhere"),
        );
        assert_eq!(error.message, "Task was modified elsewhere");
        assert!(error.has_server_message());
    }

    #[rstest]
    fn test_blank_server_message_falls_back() {
        let error = MutationError::new(MutationKind::Delete, RemoteError::with_message(500, "  "));
        assert_eq!(error.message, "Failed to delete task.");
    }
}
