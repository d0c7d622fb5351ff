//! Errors raised by hosting providers and the URL extractor.

use std::io;
use std::path::PathBuf;

use tally_core::{ErrorCategory, ProcessError, WorkflowError};
use thiserror::Error;

/// Type alias for results of hosting operations.
pub type HostingResult<T, E = HostingError> = std::result::Result<T, E>;

/// Output fragments that indicate the hosting CLI is not authenticated.
const AUTH_MARKERS: &[&str] = &[
    "not logged in",
    "authenticate",
    "credentials",
    "login:ci",
    "401",
];

/// Errors raised while talking to the hosting backend.
#[derive(Debug, Error)]
pub enum HostingError {
    /// The hosting CLI could not be started or timed out.
    #[error("{operation} failed: {source}")]
    Process {
        /// Operation that was attempted.
        operation: &'static str,
        #[source]
        source: ProcessError,
    },

    /// The hosting CLI exited with a non-zero code.
    #[error("{operation} failed: {message}")]
    CommandFailed {
        /// Operation that was attempted.
        operation: &'static str,
        /// Failure description including the tail of the output.
        message: String,
        /// Whether the output pointed at missing or expired credentials.
        unauthenticated: bool,
    },

    /// The hosting CLI printed something that could not be parsed.
    #[error("{operation} returned unexpected output: {source}")]
    InvalidOutput {
        /// Operation that was attempted.
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A local file could not be read or written.
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        /// File that was accessed.
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A local file could not be encoded or decoded as JSON.
    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        /// File that was written or read.
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl HostingError {
    /// Creates a command failure, classifying authentication problems by output.
    pub fn command_failed(operation: &'static str, message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        let unauthenticated = AUTH_MARKERS.iter().any(|marker| lowered.contains(marker));
        Self::CommandFailed {
            operation,
            message,
            unauthenticated,
        }
    }

    /// Returns the workflow category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Process { source, .. } if source.is_spawn_failure() => ErrorCategory::Dependency,
            Self::CommandFailed {
                unauthenticated: true,
                ..
            } => ErrorCategory::Authentication,
            _ => ErrorCategory::Deployment,
        }
    }
}

impl From<HostingError> for WorkflowError {
    fn from(error: HostingError) -> Self {
        WorkflowError::new(error.category(), error.to_string())
    }
}
