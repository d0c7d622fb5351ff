//! Documentation coverage report.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lenient::{lenient_count, lenient_float, lenient_seq};

/// Output of the documentation checker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocQualityReport {
    /// Coverage in percent, when the checker computes it.
    #[serde(default, deserialize_with = "lenient_float")]
    pub coverage: Option<f64>,
    /// Number of documented items.
    #[serde(default, deserialize_with = "lenient_count")]
    pub documented: Option<u64>,
    /// Number of items that should be documented.
    #[serde(default, deserialize_with = "lenient_count")]
    pub total: Option<u64>,
    /// Individual findings.
    #[serde(default, deserialize_with = "lenient_seq")]
    pub issues: Vec<Value>,
}

impl DocQualityReport {
    /// Returns coverage in percent, clamped to 0..=100.
    ///
    /// Prefers the reported value and falls back to documented / total.
    pub fn coverage_percent(&self) -> f64 {
        let computed = || match (self.documented, self.total) {
            (Some(documented), Some(total)) if total > 0 => {
                documented as f64 / total as f64 * 100.0
            }
            _ => 0.0,
        };
        self.coverage.unwrap_or_else(computed).clamp(0.0, 100.0)
    }

    /// Returns the number of findings.
    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    /// Returns the number of documented items.
    pub fn documented(&self) -> u64 {
        self.documented.unwrap_or(0)
    }

    /// Returns the number of items that should be documented.
    pub fn total_items(&self) -> u64 {
        self.total.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_is_computed_when_missing() {
        let report: DocQualityReport =
            serde_json::from_str(r#"{"documented": 3, "total": 4, "issues": [{}, {}]}"#).unwrap();
        assert_eq!(report.coverage_percent(), 75.0);
        assert_eq!(report.issue_count(), 2);
    }

    #[test]
    fn reported_coverage_wins_and_is_clamped() {
        let report: DocQualityReport =
            serde_json::from_str(r#"{"coverage": "120", "documented": 1, "total": 4}"#).unwrap();
        assert_eq!(report.coverage_percent(), 100.0);
    }

    #[test]
    fn empty_report_is_zero() {
        let report = DocQualityReport::default();
        assert_eq!(report.coverage_percent(), 0.0);
        assert_eq!(report.total_items(), 0);
    }
}
