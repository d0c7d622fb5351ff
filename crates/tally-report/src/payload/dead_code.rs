//! Unused code report.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lenient::{lenient, lenient_seq};

/// Unused symbols and dependencies found in one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadCodeIssue {
    /// File the findings belong to.
    #[serde(default, deserialize_with = "lenient")]
    pub file: String,
    /// Unused exported values.
    #[serde(default, deserialize_with = "lenient_seq")]
    pub exports: Vec<Value>,
    /// Unused exported types.
    #[serde(default, deserialize_with = "lenient_seq")]
    pub types: Vec<Value>,
    /// Unused runtime dependencies.
    #[serde(default, deserialize_with = "lenient_seq")]
    pub dependencies: Vec<Value>,
    /// Unused development dependencies.
    #[serde(default, deserialize_with = "lenient_seq")]
    pub dev_dependencies: Vec<Value>,
}

/// Output of the dead code scanner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeadCodeReport {
    /// Files nothing imports.
    #[serde(default, deserialize_with = "lenient_seq")]
    pub files: Vec<String>,
    /// Per-file findings.
    #[serde(default, deserialize_with = "lenient_seq")]
    pub issues: Vec<DeadCodeIssue>,
}

impl DeadCodeReport {
    /// Returns the number of unused files.
    pub fn unused_files(&self) -> usize {
        self.files.len()
    }

    /// Returns the number of unused exports, values and types alike.
    pub fn unused_exports(&self) -> usize {
        self.issues
            .iter()
            .map(|issue| issue.exports.len() + issue.types.len())
            .sum()
    }

    /// Returns the number of unused dependencies, development ones included.
    pub fn unused_dependencies(&self) -> usize {
        self.issues
            .iter()
            .map(|issue| issue.dependencies.len() + issue.dev_dependencies.len())
            .sum()
    }

    /// Returns the number of findings of any kind.
    pub fn total(&self) -> usize {
        self.unused_files() + self.unused_exports() + self.unused_dependencies()
    }
}
