//! Typed payloads of the five report kinds.
//!
//! Every field deserializes leniently, and every accessor degrades to zero or
//! empty when the data it needs is missing.

mod bundle;
mod dead_code;
mod doc_quality;
pub(crate) mod lenient;
mod performance;
mod vulnerability;

pub use bundle::{BundleAsset, BundleReport};
pub use dead_code::{DeadCodeIssue, DeadCodeReport};
pub use doc_quality::DocQualityReport;
pub use performance::{CATEGORIES as PERFORMANCE_CATEGORIES, PerformanceReport};
pub use vulnerability::{AuditMetadata, Severity, VulnerabilityReport};
