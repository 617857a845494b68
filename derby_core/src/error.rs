//! Error types for the race engine.

use thiserror::Error;

/// Errors surfaced by the race engine and its collaborators.
///
/// A cancelled (stale) run is not an error; it is reported as
/// [`RunOutcome::Cancelled`](crate::engine::RunOutcome).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RaceError {
    /// A sampler was asked for more items than it was given.
    #[error("Invalid argument: count ({count}) > items.len() ({available})")]
    InvalidArgument { count: usize, available: usize },

    /// A command was issued before the roster or schedule was ready.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// The spawned run task panicked or was aborted by the runtime.
    #[error("Run task failed: {0}")]
    TaskFailed(String),
}

impl RaceError {
    /// Creates a precondition error.
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }
}

impl From<tokio::task::JoinError> for RaceError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_names_both_values() {
        let err = RaceError::InvalidArgument { count: 4, available: 3 };
        let msg = err.to_string();

        assert!(msg.contains("count (4)"));
        assert!(msg.contains("(3)"));
    }
}
