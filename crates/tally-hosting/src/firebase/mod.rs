//! Firebase Hosting preview channels through the `firebase` CLI.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use tally_core::ProcessRunner;
//! use tally_hosting::firebase::FirebaseCli;
//! use tally_hosting::{HostingConfig, HostingProvider};
//!
//! let config = HostingConfig::new(["admin", "hours"], 5);
//! let cli = FirebaseCli::new(Arc::new(ProcessRunner::new()), &config);
//! let channels = cli.list_channels("admin").await?;
//! ```

mod client;
mod listing;

pub use client::FirebaseCli;

/// Tracing target for Firebase CLI operations.
pub const TRACING_TARGET: &str = "tally_hosting::firebase";
