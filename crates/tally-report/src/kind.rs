//! The known report kinds.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

/// A checker subsystem that writes one JSON artifact per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(AsRefStr, Display, EnumString, EnumIter, IntoStaticStr)]
#[derive(Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// Bundle size analysis.
    Bundle,
    /// Dependency vulnerability audit.
    Vulnerability,
    /// Unused files, exports and dependencies.
    DeadCode,
    /// Documentation coverage.
    DocQuality,
    /// Lighthouse-style performance scores.
    Performance,
}

impl ReportKind {
    /// Returns the artifact file name the checker writes.
    #[must_use]
    pub const fn default_file_name(self) -> &'static str {
        match self {
            Self::Bundle => "bundle-report.json",
            Self::Vulnerability => "vulnerability-report.json",
            Self::DeadCode => "dead-code-report.json",
            Self::DocQuality => "doc-quality-report.json",
            Self::Performance => "performance-report.json",
        }
    }

    /// Returns the dashboard section title.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Bundle => "Bundle size",
            Self::Vulnerability => "Vulnerabilities",
            Self::DeadCode => "Dead code",
            Self::DocQuality => "Documentation",
            Self::Performance => "Performance",
        }
    }
}
