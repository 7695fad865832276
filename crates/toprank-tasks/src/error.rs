//! Error types for task store operations.
//!
//! Provides [`TaskError`], an error enum carrying the fingerprint and status
//! context of the failed operation.

use std::fmt;

use crate::types::task::TaskStatus;

/// Errors that can occur during task store operations.
///
/// # Examples
///
/// ```
/// use toprank_tasks::TaskError;
///
/// let err = TaskError::NotFound {
///     fingerprint: "abc123".to_string(),
/// };
/// assert_eq!(err.to_string(), "task not found: abc123");
/// ```
#[derive(Debug)]
pub enum TaskError {
    /// Attempted to move a task out of a terminal state, or into a state it
    /// cannot reach.
    InvalidTransition {
        /// Fingerprint of the task being transitioned.
        fingerprint: String,
        /// The current status of the task.
        from: TaskStatus,
        /// The target status that was rejected.
        to: TaskStatus,
    },

    /// No live task exists for the fingerprint (or the generation that was
    /// addressed has already been evicted and replaced).
    NotFound {
        /// The fingerprint that was looked up.
        fingerprint: String,
    },
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTransition {
                fingerprint,
                from,
                to,
            } => write!(
                f,
                "invalid transition from {from} to {to} for task {fingerprint}"
            ),
            Self::NotFound { fingerprint } => write!(f, "task not found: {fingerprint}"),
        }
    }
}

impl std::error::Error for TaskError {}
