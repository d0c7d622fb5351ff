//! Report locations and dashboard output configuration.

use std::path::PathBuf;

use anyhow::{Result as AnyhowResult, anyhow};
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::collector::{ReportPaths, default_report_dir};
use crate::kind::ReportKind;
use crate::render::DashboardFormat;

/// Default dashboard artifact path.
pub const DEFAULT_DASHBOARD_PATH: &str = "preview-dashboard.md";

/// File name of the URL cache inside the report directory.
pub const URL_CACHE_FILE_NAME: &str = "preview-urls.json";

/// Where check reports are read from and where the dashboard goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct ReportConfig {
    /// Directory the checkers write their reports to.
    #[cfg_attr(feature = "config", arg(long, env = "TALLY_REPORT_DIR"))]
    #[serde(default)]
    pub report_dir: Option<PathBuf>,

    /// Bundle size report path.
    #[cfg_attr(feature = "config", arg(long, env = "TALLY_BUNDLE_REPORT"))]
    #[serde(default)]
    pub bundle_report: Option<PathBuf>,

    /// Vulnerability audit report path.
    #[cfg_attr(feature = "config", arg(long, env = "TALLY_VULNERABILITY_REPORT"))]
    #[serde(default)]
    pub vulnerability_report: Option<PathBuf>,

    /// Dead code report path.
    #[cfg_attr(feature = "config", arg(long, env = "TALLY_DEAD_CODE_REPORT"))]
    #[serde(default)]
    pub dead_code_report: Option<PathBuf>,

    /// Documentation coverage report path.
    #[cfg_attr(feature = "config", arg(long, env = "TALLY_DOC_QUALITY_REPORT"))]
    #[serde(default)]
    pub doc_quality_report: Option<PathBuf>,

    /// Performance report path.
    #[cfg_attr(feature = "config", arg(long, env = "TALLY_PERFORMANCE_REPORT"))]
    #[serde(default)]
    pub performance_report: Option<PathBuf>,

    /// Where the dashboard is written.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "TALLY_DASHBOARD", default_value = DEFAULT_DASHBOARD_PATH)
    )]
    #[serde(default = "default_dashboard_path")]
    pub dashboard_path: PathBuf,

    /// Dashboard format: `markdown` or `json`.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "TALLY_DASHBOARD_FORMAT", default_value = "markdown")
    )]
    #[serde(default)]
    pub dashboard_format: DashboardFormat,

    /// Where extracted preview URLs are persisted, defaults to the report directory.
    #[cfg_attr(feature = "config", arg(long, env = "TALLY_URL_CACHE"))]
    #[serde(default)]
    pub url_cache: Option<PathBuf>,

    /// Deployment log files searched for URLs when command output has none.
    #[cfg_attr(
        feature = "config",
        arg(long = "deploy-log", env = "TALLY_DEPLOY_LOGS", value_delimiter = ',')
    )]
    #[serde(default)]
    pub deploy_logs: Vec<PathBuf>,
}

fn default_dashboard_path() -> PathBuf {
    PathBuf::from(DEFAULT_DASHBOARD_PATH)
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            report_dir: None,
            bundle_report: None,
            vulnerability_report: None,
            dead_code_report: None,
            doc_quality_report: None,
            performance_report: None,
            dashboard_path: default_dashboard_path(),
            dashboard_format: DashboardFormat::default(),
            url_cache: None,
            deploy_logs: Vec::new(),
        }
    }
}

impl ReportConfig {
    /// Sets the report directory.
    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(dir.into());
        self
    }

    /// Sets the dashboard path and format.
    pub fn with_dashboard(mut self, path: impl Into<PathBuf>, format: DashboardFormat) -> Self {
        self.dashboard_path = path.into();
        self.dashboard_format = format;
        self
    }

    /// Returns the configured report directory or the default one.
    pub fn report_dir(&self) -> PathBuf {
        self.report_dir.clone().unwrap_or_else(default_report_dir)
    }

    /// Returns the report paths with every override applied.
    pub fn paths(&self) -> ReportPaths {
        let overrides = [
            (ReportKind::Bundle, &self.bundle_report),
            (ReportKind::Vulnerability, &self.vulnerability_report),
            (ReportKind::DeadCode, &self.dead_code_report),
            (ReportKind::DocQuality, &self.doc_quality_report),
            (ReportKind::Performance, &self.performance_report),
        ];

        overrides
            .into_iter()
            .filter_map(|(kind, path)| path.as_ref().map(|path| (kind, path)))
            .fold(ReportPaths::new(self.report_dir()), |paths, (kind, path)| {
                paths.with_override(kind, path)
            })
    }

    /// Returns where extracted URLs are persisted.
    pub fn url_cache_path(&self) -> PathBuf {
        self.url_cache
            .clone()
            .unwrap_or_else(|| self.report_dir().join(URL_CACHE_FILE_NAME))
    }

    /// Validates all configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if the dashboard path is empty or names a directory.
    pub fn validate(&self) -> AnyhowResult<()> {
        if self.dashboard_path.as_os_str().is_empty() {
            return Err(anyhow!("Dashboard path must not be empty."));
        }

        if self.dashboard_path.is_dir() {
            return Err(anyhow!(
                "Dashboard path '{}' is a directory. Provide a file path.",
                self.dashboard_path.display()
            ));
        }

        Ok(())
    }
}
