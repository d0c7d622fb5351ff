//! Bundle size report.

use serde::{Deserialize, Serialize};

use super::lenient::{lenient, lenient_count, lenient_seq};

/// One emitted asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleAsset {
    /// Asset file name.
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    /// Raw size in bytes.
    #[serde(default, deserialize_with = "lenient_count")]
    pub size: Option<u64>,
    /// Gzip-compressed size in bytes.
    #[serde(default, deserialize_with = "lenient_count")]
    pub gzip_size: Option<u64>,
}

/// Output of the bundle analyzer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleReport {
    /// Total raw size, when the analyzer reports it.
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_size: Option<u64>,
    /// Total gzip size, when the analyzer reports it.
    #[serde(default, deserialize_with = "lenient_count")]
    pub gzip_size: Option<u64>,
    /// Size budget in bytes.
    #[serde(default, deserialize_with = "lenient_count")]
    pub budget: Option<u64>,
    /// Individual assets.
    #[serde(default, deserialize_with = "lenient_seq")]
    pub assets: Vec<BundleAsset>,
}

impl BundleReport {
    /// Returns the total raw size, summing assets when no total was reported.
    pub fn total_bytes(&self) -> u64 {
        self.total_size
            .unwrap_or_else(|| sum_sizes(self.assets.iter().filter_map(|asset| asset.size)))
    }

    /// Returns the total gzip size, summing assets when no total was reported.
    pub fn gzip_bytes(&self) -> u64 {
        self.gzip_size
            .unwrap_or_else(|| sum_sizes(self.assets.iter().filter_map(|asset| asset.gzip_size)))
    }

    /// Returns the number of assets.
    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    /// Returns the largest asset by raw size.
    pub fn largest_asset(&self) -> Option<&BundleAsset> {
        self.assets
            .iter()
            .filter(|asset| asset.size.is_some())
            .max_by_key(|asset| asset.size)
    }

    /// Returns whether the total exceeds the budget. No budget is never over.
    pub fn over_budget(&self) -> bool {
        self.budget.is_some_and(|budget| self.total_bytes() > budget)
    }
}

fn sum_sizes(sizes: impl Iterator<Item = u64>) -> u64 {
    sizes.fold(0, u64::saturating_add)
}
