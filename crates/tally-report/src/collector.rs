//! Loading of check report artifacts.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::IntoEnumIterator;

use crate::TRACING_TARGET;
use crate::kind::ReportKind;
use crate::payload::{
    BundleReport, DeadCodeReport, DocQualityReport, PerformanceReport, VulnerabilityReport,
};
use crate::state::ReportState;

/// Name of the report directory created under the system temp dir.
pub const DEFAULT_REPORT_DIR_NAME: &str = "tally-reports";

/// Returns the directory checkers write to when none is configured.
pub fn default_report_dir() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_REPORT_DIR_NAME)
}

/// Where each report kind is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    dir: PathBuf,
    overrides: BTreeMap<ReportKind, PathBuf>,
}

impl Default for ReportPaths {
    fn default() -> Self {
        Self::new(default_report_dir())
    }
}

impl ReportPaths {
    /// Reads every kind from its default file name inside `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            overrides: BTreeMap::new(),
        }
    }

    /// Reads `kind` from `path` instead.
    pub fn with_override(mut self, kind: ReportKind, path: impl Into<PathBuf>) -> Self {
        self.overrides.insert(kind, path.into());
        self
    }

    /// Returns the report directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the artifact path of `kind`.
    pub fn path(&self, kind: ReportKind) -> PathBuf {
        self.overrides
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| self.dir.join(kind.default_file_name()))
    }
}

/// Everything the checkers produced, one slot per kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectedReports {
    /// Bundle size report.
    pub bundle: ReportState<BundleReport>,
    /// Dependency audit report.
    pub vulnerability: ReportState<VulnerabilityReport>,
    /// Dead code report.
    pub dead_code: ReportState<DeadCodeReport>,
    /// Documentation coverage report.
    pub doc_quality: ReportState<DocQualityReport>,
    /// Performance report.
    pub performance: ReportState<PerformanceReport>,
}

impl CollectedReports {
    /// Returns whether the report of `kind` was loaded.
    pub fn is_available(&self, kind: ReportKind) -> bool {
        match kind {
            ReportKind::Bundle => self.bundle.is_available(),
            ReportKind::Vulnerability => self.vulnerability.is_available(),
            ReportKind::DeadCode => self.dead_code.is_available(),
            ReportKind::DocQuality => self.doc_quality.is_available(),
            ReportKind::Performance => self.performance.is_available(),
        }
    }

    /// Returns the number of loaded reports.
    pub fn available_count(&self) -> usize {
        ReportKind::iter()
            .filter(|kind| self.is_available(*kind))
            .count()
    }
}

/// Loads report artifacts.
#[derive(Debug, Clone, Default)]
pub struct ReportCollector {
    paths: ReportPaths,
}

impl ReportCollector {
    /// Creates a collector reading from `paths`.
    pub fn new(paths: ReportPaths) -> Self {
        Self { paths }
    }

    /// Returns where reports are read from.
    pub fn paths(&self) -> &ReportPaths {
        &self.paths
    }

    /// Loads every report kind independently.
    ///
    /// Never fails: a missing or broken artifact only affects its own slot.
    pub async fn collect(&self) -> CollectedReports {
        let (bundle, vulnerability, dead_code, doc_quality, performance) = futures::join!(
            self.load(ReportKind::Bundle),
            self.load(ReportKind::Vulnerability),
            self.load(ReportKind::DeadCode),
            self.load(ReportKind::DocQuality),
            self.load(ReportKind::Performance),
        );

        let reports = CollectedReports {
            bundle,
            vulnerability,
            dead_code,
            doc_quality,
            performance,
        };

        tracing::info!(
            target: TRACING_TARGET,
            dir = %self.paths.dir().display(),
            available = reports.available_count(),
            "Collected check reports"
        );

        reports
    }

    /// Loads one report kind.
    pub async fn load<T: DeserializeOwned>(&self, kind: ReportKind) -> ReportState<T> {
        let path = self.paths.path(kind);
        let state = read_report(&path).await;

        match &state {
            ReportState::Available(_) => {
                tracing::debug!(target: TRACING_TARGET, kind = %kind, path = %path.display(), "Loaded report");
            }
            ReportState::Missing => {
                tracing::debug!(target: TRACING_TARGET, kind = %kind, path = %path.display(), "Report not found");
            }
            ReportState::Unreadable(reason) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    kind = %kind,
                    path = %path.display(),
                    reason = %reason,
                    "Report is unreadable"
                );
            }
        }

        state
    }
}

async fn read_report<T: DeserializeOwned>(path: &Path) -> ReportState<T> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return ReportState::Missing,
        Err(error) => return ReportState::Unreadable(format!("failed to read: {error}")),
    };

    let value: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(error) => return ReportState::Unreadable(format!("invalid JSON: {error}")),
    };

    if !value.is_object() {
        return ReportState::Unreadable("expected a JSON object".to_owned());
    }

    match T::deserialize(value) {
        Ok(report) => ReportState::Available(report),
        Err(error) => ReportState::Unreadable(format!("unexpected shape: {error}")),
    }
}
