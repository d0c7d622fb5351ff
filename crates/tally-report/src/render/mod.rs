//! Dashboard renderers and the artifact writer.

mod markdown;

use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

pub use self::markdown::render_markdown;
use crate::TRACING_TARGET;
use crate::dashboard::ConsolidatedDashboard;
use crate::error::{ReportError, ReportResult};

/// Output format of the dashboard artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr)]
#[derive(Serialize, Deserialize)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum DashboardFormat {
    /// A markdown document, suitable as a pull request comment.
    #[default]
    Markdown,
    /// The serialized dashboard.
    Json,
}

impl DashboardFormat {
    /// Returns the conventional file extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }

    /// Renders `dashboard` in this format.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render(self, dashboard: &ConsolidatedDashboard) -> ReportResult<String> {
        match self {
            Self::Markdown => Ok(render_markdown(dashboard)),
            Self::Json => Ok(serde_json::to_string_pretty(dashboard)?),
        }
    }
}

/// Renders `dashboard` and writes it to `path`, creating parent directories.
///
/// # Errors
///
/// Returns an error if rendering or any filesystem operation fails.
pub async fn write_dashboard(
    dashboard: &ConsolidatedDashboard,
    format: DashboardFormat,
    path: &Path,
) -> ReportResult<()> {
    let rendered = format.render(dashboard)?;
    let io_error = |source: std::io::Error| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    tokio::fs::write(path, rendered).await.map_err(io_error)?;

    tracing::info!(
        target: TRACING_TARGET,
        path = %path.display(),
        format = %format,
        "Wrote dashboard"
    );

    Ok(())
}
