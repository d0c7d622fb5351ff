//! In-process view of the remote preview channel pool and its eviction policy.
//!
//! The remote backend is the source of truth: [`ChannelRegistry::refresh`]
//! replaces the local view of a site wholesale and nothing is assumed to
//! survive between runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tally_core::{ErrorCategory, WorkflowError};

use crate::channel::PreviewChannel;
use crate::error::HostingResult;
use crate::provider::HostingProvider;

/// Tracing target for channel registry operations.
pub const TRACING_TARGET: &str = "tally_hosting::registry";

#[derive(Debug, Default)]
struct SiteChannels {
    current: Vec<PreviewChannel>,
    evicted: Vec<PreviewChannel>,
    failed_deletions: Vec<FailedDeletion>,
}

/// Channels of every known site, newest first.
pub struct ChannelRegistry {
    provider: Arc<dyn HostingProvider>,
    sites: BTreeMap<String, SiteChannels>,
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("sites", &self.sites)
            .finish_non_exhaustive()
    }
}

impl ChannelRegistry {
    /// Creates an empty registry over the given provider.
    pub fn new(provider: Arc<dyn HostingProvider>) -> Self {
        Self {
            provider,
            sites: BTreeMap::new(),
        }
    }

    /// Returns the provider backing this registry.
    pub fn provider(&self) -> &Arc<dyn HostingProvider> {
        &self.provider
    }

    /// Replaces the view of `site` with the full remote listing.
    pub async fn refresh(&mut self, site: &str) -> HostingResult<&[PreviewChannel]> {
        let mut channels = self.provider.list_channels(site).await?;
        sort_newest_first(&mut channels);

        tracing::debug!(
            target: TRACING_TARGET,
            site,
            channels = channels.len(),
            "Refreshed channel view"
        );

        let entry = self.sites.entry(site.to_owned()).or_default();
        entry.current = channels;
        Ok(&entry.current)
    }

    /// Adds a channel this run created, keeping newest-first order.
    ///
    /// A channel with the same id on the same site is replaced.
    pub fn record_created(&mut self, channel: PreviewChannel) {
        let entry = self.sites.entry(channel.site.clone()).or_default();
        entry.current.retain(|existing| existing.id != channel.id);
        entry.current.push(channel);
        sort_newest_first(&mut entry.current);
    }

    /// Returns the channels of `site`, newest first.
    pub fn channels(&self, site: &str) -> &[PreviewChannel] {
        self.sites
            .get(site)
            .map_or(&[][..], |entry| entry.current.as_slice())
    }

    /// Returns the channels deleted from `site` during this run.
    pub fn evicted(&self, site: &str) -> &[PreviewChannel] {
        self.sites
            .get(site)
            .map_or(&[][..], |entry| entry.evicted.as_slice())
    }

    /// Returns every site the registry knows about, sorted.
    pub fn sites(&self) -> impl Iterator<Item = &str> {
        self.sites.keys().map(String::as_str)
    }

    /// Deletes every channel of `site` beyond the `keep` most recent ones.
    ///
    /// Deletions run concurrently and independently: one failure never stops
    /// the others. Channels that could not be deleted stay in the view, since
    /// they still exist remotely.
    pub async fn evict(&mut self, site: &str, keep: usize) -> EvictionOutcome {
        let entry = self.sites.entry(site.to_owned()).or_default();
        sort_newest_first(&mut entry.current);

        if entry.current.len() <= keep {
            tracing::debug!(
                target: TRACING_TARGET,
                site,
                channels = entry.current.len(),
                keep,
                "Nothing to evict"
            );
            return EvictionOutcome {
                site: site.to_owned(),
                kept: entry.current.clone(),
                deleted: Vec::new(),
                failed_deletions: Vec::new(),
            };
        }

        let to_delete = entry.current.split_off(keep);
        let kept = entry.current.clone();

        tracing::info!(
            target: TRACING_TARGET,
            site,
            keep,
            scheduled = to_delete.len(),
            "Evicting preview channels"
        );

        let provider = Arc::clone(&self.provider);
        let results = join_all(
            to_delete
                .iter()
                .map(|channel| provider.delete_channel(&channel.id, site)),
        )
        .await;

        let mut deleted = Vec::new();
        let mut failed_deletions = Vec::new();
        for (channel, result) in to_delete.into_iter().zip(results) {
            match result {
                Ok(()) => {
                    tracing::debug!(
                        target: TRACING_TARGET,
                        site,
                        channel = %channel.id,
                        "Deleted preview channel"
                    );
                    deleted.push(channel);
                }
                Err(error) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        site,
                        channel = %channel.id,
                        error = %error,
                        "Failed to delete preview channel"
                    );
                    failed_deletions.push(FailedDeletion {
                        channel,
                        message: error.to_string(),
                    });
                }
            }
        }

        entry
            .current
            .extend(failed_deletions.iter().map(|failed| failed.channel.clone()));
        entry.evicted.extend(deleted.iter().cloned());
        entry.failed_deletions.extend(failed_deletions.iter().cloned());

        tracing::info!(
            target: TRACING_TARGET,
            site,
            deleted = deleted.len(),
            failed = failed_deletions.len(),
            "Eviction finished"
        );

        EvictionOutcome {
            site: site.to_owned(),
            kept,
            deleted,
            failed_deletions,
        }
    }

    /// Returns a deterministic, serializable copy of the registry.
    pub fn snapshot(&self) -> ChannelSnapshot {
        let sites = self
            .sites
            .iter()
            .map(|(site, entry)| SiteSnapshot {
                site: site.clone(),
                current: entry.current.clone(),
                evicted: entry.evicted.clone(),
                failed_deletions: entry.failed_deletions.clone(),
            })
            .collect();

        ChannelSnapshot { sites }
    }
}

fn sort_newest_first(channels: &mut [PreviewChannel]) {
    channels.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// A channel that should have been deleted but was not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedDeletion {
    /// The channel that is still present.
    pub channel: PreviewChannel,
    /// Why the deletion failed.
    pub message: String,
}

impl FailedDeletion {
    /// Converts the failure into a non-fatal deployment error.
    pub fn to_workflow_error(&self) -> WorkflowError {
        WorkflowError::new(
            ErrorCategory::Deployment,
            format!(
                "failed to delete channel `{}` of site `{}`: {}",
                self.channel.id, self.channel.site, self.message
            ),
        )
    }
}

/// Result of one [`ChannelRegistry::evict`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionOutcome {
    /// Site that was cleaned up.
    pub site: String,
    /// Channels retained, newest first.
    pub kept: Vec<PreviewChannel>,
    /// Channels that were deleted.
    pub deleted: Vec<PreviewChannel>,
    /// Channels whose deletion failed.
    pub failed_deletions: Vec<FailedDeletion>,
}

impl EvictionOutcome {
    /// Returns the number of channels deleted.
    pub fn deleted_count(&self) -> usize {
        self.deleted.len()
    }

    /// Returns the number of deletions attempted.
    pub fn attempted(&self) -> usize {
        self.deleted.len() + self.failed_deletions.len()
    }

    /// Returns whether every scheduled deletion succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed_deletions.is_empty()
    }
}

/// Serializable state of the registry at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    /// Sites in lexical order.
    pub sites: Vec<SiteSnapshot>,
}

impl ChannelSnapshot {
    /// Returns the snapshot of one site.
    pub fn site(&self, site: &str) -> Option<&SiteSnapshot> {
        self.sites.iter().find(|entry| entry.site == site)
    }

    /// Returns whether no site was ever touched.
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// Channels of one site at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSnapshot {
    /// Site name.
    pub site: String,
    /// Channels still present, newest first.
    pub current: Vec<PreviewChannel>,
    /// Channels deleted during the run.
    pub evicted: Vec<PreviewChannel>,
    /// Deletions that failed during the run.
    pub failed_deletions: Vec<FailedDeletion>,
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use jiff::Timestamp;
    use tally_core::CommandOutput;

    use super::*;
    use crate::channel::ChannelId;
    use crate::error::HostingError;

    #[derive(Default)]
    struct FakeProvider {
        listing: Vec<PreviewChannel>,
        failing: HashSet<String>,
        deleted: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        fn with_channels(site: &str, count: usize) -> Self {
            let listing = (0..count)
                .map(|i| {
                    let created_at = Timestamp::from_second(1_700_000_000 + i as i64 * 60).unwrap();
                    PreviewChannel::new(format!("ch{i}"), site, created_at)
                })
                .collect();
            Self {
                listing,
                ..Self::default()
            }
        }

        fn failing(mut self, id: &str) -> Self {
            self.failing.insert(id.to_owned());
            self
        }

        fn deleted(&self) -> Vec<String> {
            let mut deleted = self.deleted.lock().unwrap().clone();
            deleted.sort();
            deleted
        }
    }

    #[async_trait::async_trait]
    impl HostingProvider for FakeProvider {
        async fn list_channels(&self, _site: &str) -> HostingResult<Vec<PreviewChannel>> {
            Ok(self.listing.clone())
        }

        async fn create_channel(
            &self,
            id: &ChannelId,
            site: &str,
        ) -> HostingResult<PreviewChannel> {
            Ok(PreviewChannel::new(id.clone(), site, Timestamp::now()))
        }

        async fn deploy_to_channel(
            &self,
            _id: &ChannelId,
            _site: &str,
        ) -> HostingResult<CommandOutput> {
            Ok(CommandOutput::success(""))
        }

        async fn delete_channel(&self, id: &ChannelId, _site: &str) -> HostingResult<()> {
            self.deleted.lock().unwrap().push(id.to_string());
            if self.failing.contains(id.as_str()) {
                return Err(HostingError::command_failed("delete channel", "HTTP Error: 500"));
            }
            Ok(())
        }
    }

    fn ids(channels: &[PreviewChannel]) -> Vec<&str> {
        channels.iter().map(|channel| channel.id.as_str()).collect()
    }

    #[tokio::test]
    async fn evict_keeps_exactly_the_newest_channels() {
        for count in 0..8usize {
            for keep in 1..5usize {
                let provider = Arc::new(FakeProvider::with_channels("admin", count));
                let mut registry = ChannelRegistry::new(provider.clone());
                registry.refresh("admin").await.unwrap();

                let outcome = registry.evict("admin", keep).await;

                let expected_kept: Vec<String> = (0..count)
                    .rev()
                    .take(keep)
                    .map(|i| format!("ch{i}"))
                    .collect();
                assert_eq!(ids(&outcome.kept), expected_kept, "n={count} k={keep}");
                assert_eq!(outcome.deleted_count(), count.saturating_sub(keep));
                assert_eq!(provider.deleted().len(), count.saturating_sub(keep));
                assert_eq!(registry.channels("admin").len(), count.min(keep));
            }
        }
    }

    #[tokio::test]
    async fn evict_below_capacity_is_a_no_op() {
        let provider = Arc::new(FakeProvider::with_channels("hours", 2));
        let mut registry = ChannelRegistry::new(provider.clone());
        registry.refresh("hours").await.unwrap();

        let outcome = registry.evict("hours", 5).await;

        assert_eq!(outcome.attempted(), 0);
        assert!(outcome.is_clean());
        assert!(provider.deleted().is_empty());
        assert!(registry.evicted("hours").is_empty());
    }

    #[tokio::test]
    async fn one_failed_deletion_does_not_block_the_others() {
        let provider = Arc::new(FakeProvider::with_channels("admin", 6).failing("ch1"));
        let mut registry = ChannelRegistry::new(provider.clone());
        registry.refresh("admin").await.unwrap();

        let outcome = registry.evict("admin", 2).await;

        assert_eq!(provider.deleted(), vec!["ch0", "ch1", "ch2", "ch3"]);
        assert_eq!(outcome.deleted_count(), 3);
        assert_eq!(outcome.failed_deletions.len(), 1);
        assert_eq!(outcome.failed_deletions[0].channel.id.as_str(), "ch1");

        let error = outcome.failed_deletions[0].to_workflow_error();
        assert_eq!(error.category, ErrorCategory::Deployment);

        assert_eq!(ids(registry.channels("admin")), vec!["ch5", "ch4", "ch1"]);
        assert_eq!(registry.evicted("admin").len(), 3);
    }

    #[tokio::test]
    async fn record_created_keeps_order_and_replaces_duplicates() {
        let provider = Arc::new(FakeProvider::with_channels("admin", 2));
        let mut registry = ChannelRegistry::new(provider);
        registry.refresh("admin").await.unwrap();

        let newest = Timestamp::from_second(1_800_000_000).unwrap();
        registry.record_created(PreviewChannel::new("fresh", "admin", newest));
        registry.record_created(PreviewChannel::new("fresh", "admin", newest));

        assert_eq!(ids(registry.channels("admin")), vec!["fresh", "ch1", "ch0"]);
    }

    #[tokio::test]
    async fn snapshot_is_sorted_and_includes_evictions() {
        let provider = Arc::new(FakeProvider::with_channels("x", 3));
        let mut registry = ChannelRegistry::new(provider);
        registry.refresh("hours").await.unwrap();
        registry.refresh("admin").await.unwrap();
        registry.evict("admin", 1).await;

        let snapshot = registry.snapshot();
        let sites: Vec<&str> = snapshot.sites.iter().map(|s| s.site.as_str()).collect();
        assert_eq!(sites, vec!["admin", "hours"]);

        let admin = snapshot.site("admin").unwrap();
        assert_eq!(admin.current.len(), 1);
        assert_eq!(admin.evicted.len(), 2);
        assert_eq!(snapshot, registry.snapshot());
    }
}
