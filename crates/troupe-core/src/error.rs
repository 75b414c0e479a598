//! Error types for Troupe
//!
//! TigerStyle: Explicit error types with context, using thiserror.
//!
//! Expected outcomes (a delivery that gave up, an idempotent stop) are plain
//! return values; only misuse of a state machine surfaces as an `Error`.

use thiserror::Error;

/// Result type alias for Troupe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Troupe error types
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Invalid State Errors
    // =========================================================================
    #[error("Reference already stopped: {name}")]
    ReferenceStopped { name: String },

    #[error("Executor already stopped")]
    ExecutorStopped,

    #[error("System already stopped")]
    SystemStopped,

    #[error("Actor lifecycle violation: {name}, expected: {expected}, actual: {actual}")]
    ActorLifecycle {
        name: String,
        expected: String,
        actual: String,
    },

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Actor name too long: {length} bytes exceeds limit of {limit} bytes")]
    ActorNameTooLong { length: usize, limit: usize },

    // =========================================================================
    // Submission Errors
    // =========================================================================
    #[error("Task rejected: {reason}")]
    TaskRejected { reason: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {field}, reason: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("Already initialized: {what}")]
    AlreadyInitialized { what: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl Error {
    /// Create a reference stopped error
    pub fn reference_stopped(name: impl Into<String>) -> Self {
        Self::ReferenceStopped { name: name.into() }
    }

    /// Create an actor lifecycle violation error
    pub fn actor_lifecycle(
        name: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ActorLifecycle {
            name: name.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a task rejected error
    pub fn task_rejected(reason: impl Into<String>) -> Self {
        Self::TaskRejected {
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Check if this error reports an operation on a terminal state machine
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            Self::ReferenceStopped { .. }
                | Self::ExecutorStopped
                | Self::SystemStopped
                | Self::ActorLifecycle { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::reference_stopped("counter");
        assert!(err.to_string().contains("counter"));
    }

    #[test]
    fn test_error_is_invalid_state() {
        assert!(Error::ExecutorStopped.is_invalid_state());
        assert!(Error::reference_stopped("a").is_invalid_state());
        assert!(!Error::task_rejected("attach failed").is_invalid_state());
    }
}
