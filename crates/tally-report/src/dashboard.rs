//! The consolidated end-of-run dashboard.
//!
//! [`consolidate`] is a pure function of its inputs: it never reads the clock
//! or the filesystem, so the same inputs always yield the same dashboard.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tally_core::RunSummary;
use tally_hosting::{ChannelSnapshot, ExtractedUrls};

use crate::collector::CollectedReports;
use crate::payload::{PERFORMANCE_CATEGORIES, Severity};
use crate::state::ReportState;

/// A dashboard section: derived numbers, or a flagged placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Section<T> {
    /// The report was available.
    Available {
        /// Derived summary numbers.
        summary: T,
    },
    /// The report produced no data.
    Unavailable {
        /// Why no data is shown.
        reason: String,
    },
}

impl<T> Section<T> {
    fn from_state<R>(state: &ReportState<R>, summarize: impl FnOnce(&R) -> T) -> Self {
        match state.available() {
            Some(report) => Self::Available {
                summary: summarize(report),
            },
            None => Self::Unavailable {
                reason: state.unavailable_reason().unwrap_or_default(),
            },
        }
    }

    /// Returns the summary, if available.
    pub fn summary(&self) -> Option<&T> {
        match self {
            Self::Available { summary } => Some(summary),
            Self::Unavailable { .. } => None,
        }
    }

    /// Returns whether the section is a placeholder.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Bundle size numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleSummary {
    /// Total raw bytes.
    pub total_bytes: u64,
    /// Total gzip bytes.
    pub gzip_bytes: u64,
    /// Number of assets.
    pub asset_count: usize,
    /// Name and size of the largest asset.
    pub largest_asset: Option<(String, u64)>,
    /// Whether the size budget is exceeded.
    pub over_budget: bool,
}

/// Audit numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilitySummary {
    /// Count per severity, least severe first.
    pub counts: BTreeMap<Severity, u64>,
    /// Total findings.
    pub total: u64,
    /// Most severe level with findings.
    pub highest: Option<Severity>,
}

/// Unused code numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadCodeSummary {
    /// Unused files.
    pub unused_files: usize,
    /// Unused exports.
    pub unused_exports: usize,
    /// Unused dependencies.
    pub unused_dependencies: usize,
    /// All findings.
    pub total: usize,
}

/// Documentation numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocQualitySummary {
    /// Coverage in percent.
    pub coverage_percent: f64,
    /// Documented items.
    pub documented: u64,
    /// Items that should be documented.
    pub total_items: u64,
    /// Number of findings.
    pub issue_count: usize,
}

/// Performance numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    /// Category to score in 0..=100, for the standard categories.
    pub scores: BTreeMap<String, f64>,
}

/// One section per report kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSections {
    /// Bundle size.
    pub bundle: Section<BundleSummary>,
    /// Vulnerabilities.
    pub vulnerability: Section<VulnerabilitySummary>,
    /// Dead code.
    pub dead_code: Section<DeadCodeSummary>,
    /// Documentation.
    pub doc_quality: Section<DocQualitySummary>,
    /// Performance.
    pub performance: Section<PerformanceSummary>,
}

/// Read-only view of a run, built once at the end of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedDashboard {
    /// Workflow status, phases and grouped errors.
    pub run: RunSummary,
    /// Preview URLs, when any were extracted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<ExtractedUrls>,
    /// Current and evicted channels.
    pub channels: ChannelSnapshot,
    /// Check report sections.
    pub reports: ReportSections,
}

/// Builds the dashboard from everything a run accumulated.
pub fn consolidate(
    reports: &CollectedReports,
    channels: &ChannelSnapshot,
    run: &RunSummary,
    urls: Option<&ExtractedUrls>,
) -> ConsolidatedDashboard {
    let sections = ReportSections {
        bundle: Section::from_state(&reports.bundle, |report| BundleSummary {
            total_bytes: report.total_bytes(),
            gzip_bytes: report.gzip_bytes(),
            asset_count: report.asset_count(),
            largest_asset: report
                .largest_asset()
                .map(|asset| (asset.name.clone(), asset.size.unwrap_or(0))),
            over_budget: report.over_budget(),
        }),
        vulnerability: Section::from_state(&reports.vulnerability, |report| {
            VulnerabilitySummary {
                counts: report.counts(),
                total: report.total(),
                highest: report.highest_severity(),
            }
        }),
        dead_code: Section::from_state(&reports.dead_code, |report| DeadCodeSummary {
            unused_files: report.unused_files(),
            unused_exports: report.unused_exports(),
            unused_dependencies: report.unused_dependencies(),
            total: report.total(),
        }),
        doc_quality: Section::from_state(&reports.doc_quality, |report| DocQualitySummary {
            coverage_percent: report.coverage_percent(),
            documented: report.documented(),
            total_items: report.total_items(),
            issue_count: report.issue_count(),
        }),
        performance: Section::from_state(&reports.performance, |report| PerformanceSummary {
            scores: PERFORMANCE_CATEGORIES
                .iter()
                .map(|category| ((*category).to_owned(), report.score(category)))
                .collect(),
        }),
    };

    ConsolidatedDashboard {
        run: run.clone(),
        urls: urls.cloned(),
        channels: channels.clone(),
        reports: sections,
    }
}

#[cfg(test)]
mod tests {
    use tally_core::{PhaseRecord, WorkflowError, WorkflowRun};

    use super::*;
    use crate::payload::VulnerabilityReport;

    fn finished_run() -> RunSummary {
        let mut run = WorkflowRun::start([
            PhaseRecord::pending("build", true),
            PhaseRecord::pending("deploy", true),
        ]);
        run.errors()
            .record_fatal(WorkflowError::build("vite exited with code 1").with_phase("build"));
        run.finish(false);
        run.summary()
    }

    #[test]
    fn zero_reports_mark_every_section_unavailable() {
        let dashboard = consolidate(
            &CollectedReports::default(),
            &ChannelSnapshot::default(),
            &finished_run(),
            None,
        );

        assert!(dashboard.reports.bundle.is_unavailable());
        assert!(dashboard.reports.vulnerability.is_unavailable());
        assert!(dashboard.reports.dead_code.is_unavailable());
        assert!(dashboard.reports.doc_quality.is_unavailable());
        assert!(dashboard.reports.performance.is_unavailable());
        assert_eq!(dashboard.run.errors.total, 1);
    }

    #[test]
    fn consolidate_is_idempotent() {
        let reports = CollectedReports {
            vulnerability: ReportState::Available(
                serde_json::from_str::<VulnerabilityReport>(
                    r#"{"vulnerabilities": {"a": {"severity": "low"}}}"#,
                )
                .unwrap(),
            ),
            bundle: ReportState::Unreadable("invalid JSON".into()),
            ..CollectedReports::default()
        };
        let run = finished_run();
        let channels = ChannelSnapshot::default();

        let first = consolidate(&reports, &channels, &run, None);
        let second = consolidate(&reports, &channels, &run, None);

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );

        let summary = first.reports.vulnerability.summary().unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.highest, Some(Severity::Low));
    }
}
