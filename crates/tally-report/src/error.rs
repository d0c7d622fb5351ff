//! Errors raised while writing dashboard artifacts.

use std::path::PathBuf;

use tally_core::WorkflowError;

/// Type alias for Results with [`ReportError`].
pub type ReportResult<T, E = ReportError> = std::result::Result<T, E>;

/// Failure to produce a dashboard artifact.
///
/// Reading check reports never fails; see [`ReportState`](crate::ReportState).
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Filesystem failure on the dashboard path.
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        /// The path that was written.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The dashboard could not be serialized.
    #[error("failed to serialize dashboard: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<ReportError> for WorkflowError {
    fn from(error: ReportError) -> Self {
        WorkflowError::unknown(error.to_string())
    }
}
