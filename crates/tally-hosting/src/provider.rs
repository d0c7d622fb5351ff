//! The seam between the registry and a concrete hosting backend.

use std::sync::Arc;

use tally_core::CommandOutput;

use crate::channel::{ChannelId, PreviewChannel};
use crate::error::HostingResult;

/// Remote preview-channel API.
///
/// The provider is the only source of truth for which channels exist;
/// implementations must not cache listings between calls.
#[async_trait::async_trait]
pub trait HostingProvider: Send + Sync {
    /// Lists every preview channel of a site.
    async fn list_channels(&self, site: &str) -> HostingResult<Vec<PreviewChannel>>;

    /// Creates a channel on a site.
    async fn create_channel(&self, id: &ChannelId, site: &str) -> HostingResult<PreviewChannel>;

    /// Deploys the built site to a channel, creating it when needed.
    ///
    /// The returned output is kept verbatim for URL extraction.
    async fn deploy_to_channel(&self, id: &ChannelId, site: &str)
    -> HostingResult<CommandOutput>;

    /// Deletes a channel from a site.
    async fn delete_channel(&self, id: &ChannelId, site: &str) -> HostingResult<()>;
}

#[async_trait::async_trait]
impl<T: HostingProvider + ?Sized> HostingProvider for Arc<T> {
    async fn list_channels(&self, site: &str) -> HostingResult<Vec<PreviewChannel>> {
        (**self).list_channels(site).await
    }

    async fn create_channel(&self, id: &ChannelId, site: &str) -> HostingResult<PreviewChannel> {
        (**self).create_channel(id, site).await
    }

    async fn deploy_to_channel(
        &self,
        id: &ChannelId,
        site: &str,
    ) -> HostingResult<CommandOutput> {
        (**self).deploy_to_channel(id, site).await
    }

    async fn delete_channel(&self, id: &ChannelId, site: &str) -> HostingResult<()> {
        (**self).delete_channel(id, site).await
    }
}
