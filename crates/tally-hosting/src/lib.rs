#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod channel;
mod config;
mod error;
mod provider;

pub mod firebase;
pub mod registry;
pub mod urls;

#[doc(hidden)]
pub mod prelude;

pub use channel::{ChannelId, MAX_CHANNEL_ID_LEN, PreviewChannel};
pub use config::{DEFAULT_CHANNEL_EXPIRY, DEFAULT_FIREBASE_BIN, HostingConfig};
pub use error::{HostingError, HostingResult};
pub use provider::HostingProvider;
pub use registry::{ChannelRegistry, ChannelSnapshot, EvictionOutcome, FailedDeletion, SiteSnapshot};
pub use urls::{ExtractedUrls, UrlExtractor};
