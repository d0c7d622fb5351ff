//! Dependency audit report, in the shape `npm audit --json` produces.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use super::lenient::{as_count, lenient};

/// Advisory severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(AsRefStr, Display, EnumString, EnumIter, IntoStaticStr)]
#[derive(Serialize, Deserialize)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational only.
    Info,
    /// Low impact.
    Low,
    /// Moderate impact.
    Moderate,
    /// High impact.
    High,
    /// Critical impact.
    Critical,
}

/// Severity counts reported in the audit metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditMetadata {
    /// Severity name to count, plus an optional `total`.
    #[serde(default, deserialize_with = "lenient")]
    pub vulnerabilities: Option<BTreeMap<String, Value>>,
}

/// Output of the dependency audit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityReport {
    /// Summary block.
    #[serde(default, deserialize_with = "lenient")]
    pub metadata: AuditMetadata,
    /// Per-package findings (current audit format).
    #[serde(default, deserialize_with = "lenient")]
    pub vulnerabilities: BTreeMap<String, Value>,
    /// Per-advisory findings (legacy audit format).
    #[serde(default, deserialize_with = "lenient")]
    pub advisories: BTreeMap<String, Value>,
}

impl VulnerabilityReport {
    /// Returns the number of findings at exactly `severity`.
    ///
    /// Uses the metadata counts when present, otherwise counts the findings.
    pub fn count(&self, severity: Severity) -> u64 {
        if let Some(counts) = &self.metadata.vulnerabilities {
            return counts.get(severity.as_ref()).and_then(as_count).unwrap_or(0);
        }

        self.findings()
            .filter(|finding| finding_severity(finding) == Some(severity))
            .count() as u64
    }

    /// Returns the number of findings across all severities.
    pub fn total(&self) -> u64 {
        let reported = self
            .metadata
            .vulnerabilities
            .as_ref()
            .and_then(|counts| counts.get("total"))
            .and_then(as_count);

        reported.unwrap_or_else(|| {
            Severity::iter()
                .map(|severity| self.count(severity))
                .fold(0, u64::saturating_add)
        })
    }

    /// Returns the most severe level with at least one finding.
    pub fn highest_severity(&self) -> Option<Severity> {
        Severity::iter().rev().find(|severity| self.count(*severity) > 0)
    }

    /// Returns every severity with its count, least severe first.
    pub fn counts(&self) -> BTreeMap<Severity, u64> {
        Severity::iter()
            .map(|severity| (severity, self.count(severity)))
            .collect()
    }

    fn findings(&self) -> impl Iterator<Item = &Value> {
        self.vulnerabilities.values().chain(self.advisories.values())
    }
}

fn finding_severity(finding: &Value) -> Option<Severity> {
    finding.get("severity")?.as_str()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_counts_take_precedence() {
        let report: VulnerabilityReport = serde_json::from_str(
            r#"{
                "metadata": {"vulnerabilities": {"low": 2, "high": "1", "critical": 0, "total": 3}},
                "vulnerabilities": {"a": {"severity": "critical"}}
            }"#,
        )
        .unwrap();

        assert_eq!(report.count(Severity::Low), 2);
        assert_eq!(report.count(Severity::High), 1);
        assert_eq!(report.count(Severity::Critical), 0);
        assert_eq!(report.total(), 3);
        assert_eq!(report.highest_severity(), Some(Severity::High));
    }

    #[test]
    fn findings_are_counted_without_metadata() {
        let report: VulnerabilityReport = serde_json::from_str(
            r#"{
                "vulnerabilities": {
                    "a": {"severity": "moderate"},
                    "b": {"severity": "Moderate"},
                    "c": {"severity": 7}
                },
                "advisories": {"1001": {"severity": "critical"}}
            }"#,
        )
        .unwrap();

        assert_eq!(report.count(Severity::Moderate), 2);
        assert_eq!(report.count(Severity::Critical), 1);
        assert_eq!(report.total(), 3);
        assert_eq!(report.highest_severity(), Some(Severity::Critical));
    }

    #[test]
    fn missing_list_counts_as_zero() {
        let report: VulnerabilityReport =
            serde_json::from_str(r#"{"metadata": "garbage", "vulnerabilities": []}"#).unwrap();
        assert_eq!(report.count(Severity::High), 0);
        assert_eq!(report.total(), 0);
        assert_eq!(report.highest_severity(), None);
    }

    #[test]
    fn oversized_counts_saturate() {
        let report: VulnerabilityReport = serde_json::from_str(
            r#"{"metadata": {"vulnerabilities": {"low": 1e30, "high": 1e30}}}"#,
        )
        .unwrap();

        assert_eq!(report.count(Severity::Low), u64::MAX);
        assert_eq!(report.total(), u64::MAX);
        assert_eq!(report.highest_severity(), Some(Severity::High));
    }
}
