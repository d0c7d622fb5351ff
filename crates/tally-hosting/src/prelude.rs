//! Prelude module for convenient imports.
//!
//! ```rust
//! use tally_hosting::prelude::*;
//! ```

pub use crate::channel::{ChannelId, PreviewChannel};
pub use crate::config::HostingConfig;
pub use crate::error::{HostingError, HostingResult};
pub use crate::firebase::FirebaseCli;
pub use crate::provider::HostingProvider;
pub use crate::registry::{ChannelRegistry, ChannelSnapshot, EvictionOutcome};
pub use crate::urls::{ExtractedUrls, UrlExtractor};
