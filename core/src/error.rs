//! Error types for the hostfault-core library.

use thiserror::Error;

use crate::domain::ActionError;

/// Result type alias for hostfault operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while preparing, running or stopping a fault.
#[derive(Error, Debug)]
pub enum Error {
    /// A parameter is missing or malformed. Detected at prepare time.
    #[error("{0}")]
    Validation(String),

    /// A required external tool or capability is unavailable.
    #[error("{0}")]
    Precondition(String),

    /// A hostname, address or CIDR could not be resolved or parsed.
    #[error("Resolution failed: {0}")]
    Resolution(String),

    /// A subprocess or signal failed while the fault was running.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Failed to execute a system command.
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    /// Failed to parse command output.
    #[error("Failed to parse output: {0}")]
    ParseError(String),

    /// Failed to kill a process.
    #[error("Failed to kill process {pid}: {reason}")]
    KillFailed { pid: u32, reason: String },

    /// Permission denied for an operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the platform may retry the call that produced this error.
    ///
    /// Validation and precondition failures happen before any side effect and
    /// will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::Validation(_) | Error::Precondition(_))
    }

    /// Wrap the error into a caller-facing title/detail pair.
    pub fn into_action_error(self, title: impl Into<String>) -> ActionError {
        ActionError::new(title).with_detail(self.to_string())
    }
}

impl From<Error> for ActionError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(msg) | Error::Precondition(msg) => ActionError::new(msg),
            other => ActionError::new("Action failed").with_detail(other.to_string()),
        }
    }
}
