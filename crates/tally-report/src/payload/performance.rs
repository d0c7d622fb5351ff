//! Lighthouse-style performance report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lenient::{as_float, lenient};

/// Categories shown on the dashboard, in display order.
pub const CATEGORIES: &[&str] = &["performance", "accessibility", "best-practices", "seo"];

/// Output of the performance audit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Category id to `{ "score": .. }` or a bare score.
    #[serde(default, deserialize_with = "lenient")]
    pub categories: BTreeMap<String, Value>,
    /// Audit id to `{ "numericValue": .. }` or a bare value.
    #[serde(default, deserialize_with = "lenient")]
    pub audits: BTreeMap<String, Value>,
}

impl PerformanceReport {
    /// Returns the score of a category in 0..=100, zero when absent.
    ///
    /// Scores reported as fractions in 0..=1 are scaled.
    pub fn score(&self, category: &str) -> f64 {
        let Some(raw) = self.categories.get(category).and_then(|entry| {
            entry
                .get("score")
                .and_then(as_float)
                .or_else(|| as_float(entry))
        }) else {
            return 0.0;
        };

        let scaled = if (0.0..=1.0).contains(&raw) {
            raw * 100.0
        } else {
            raw
        };
        scaled.clamp(0.0, 100.0)
    }

    /// Returns the numeric value of an audit metric, zero when absent.
    pub fn metric(&self, name: &str) -> f64 {
        self.audits
            .get(name)
            .and_then(|entry| {
                entry
                    .get("numericValue")
                    .and_then(as_float)
                    .or_else(|| as_float(entry))
            })
            .unwrap_or(0.0)
    }

    /// Returns the score of every category present.
    pub fn scores(&self) -> BTreeMap<String, f64> {
        self.categories
            .keys()
            .map(|category| (category.clone(), self.score(category)))
            .collect()
    }
}
