//! Mutable state threaded through the pipeline phases.

use std::sync::Arc;

use jiff::Timestamp;
use tally_core::{CommandRunner, CommandSpec};
use tally_hosting::{ChannelId, ChannelRegistry, ExtractedUrls, HostingConfig, HostingProvider, UrlExtractor};
use tally_report::{ConsolidatedDashboard, ReportConfig};

use super::config::CommandConfig;

/// Everything the pipeline accumulates during one run.
///
/// Created at run start and dropped at run end; nothing carries over to the
/// next run except what the hosting backend and the file system keep.
pub struct PipelineState {
    runner: Arc<dyn CommandRunner>,
    pub(crate) registry: ChannelRegistry,
    pub(crate) extractor: UrlExtractor,
    pub(crate) hosting: HostingConfig,
    commands: CommandConfig,
    reports: ReportConfig,
    started_at: Timestamp,
    pub(crate) channel: Option<ChannelId>,
    pub(crate) dashboard: Option<ConsolidatedDashboard>,
}

impl std::fmt::Debug for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineState")
            .field("registry", &self.registry)
            .field("hosting", &self.hosting)
            .field("started_at", &self.started_at)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

impl PipelineState {
    /// Creates the state for a run starting now.
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        provider: Arc<dyn HostingProvider>,
        hosting: HostingConfig,
        commands: CommandConfig,
        reports: ReportConfig,
    ) -> Self {
        Self {
            runner,
            registry: ChannelRegistry::new(provider),
            extractor: UrlExtractor::new(hosting.sites.iter().cloned()),
            hosting,
            commands,
            reports,
            started_at: Timestamp::now(),
            channel: None,
            dashboard: None,
        }
    }

    /// Overrides the run start used for channel identifiers.
    pub fn with_started_at(mut self, started_at: Timestamp) -> Self {
        self.started_at = started_at;
        self
    }

    /// Returns the command runner.
    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    /// Returns the hosting configuration.
    pub fn hosting(&self) -> &HostingConfig {
        &self.hosting
    }

    /// Returns the configured commands.
    pub fn commands(&self) -> &CommandConfig {
        &self.commands
    }

    /// Returns the report configuration.
    pub fn reports(&self) -> &ReportConfig {
        &self.reports
    }

    /// Returns when the run started.
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Returns the channel registry.
    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Returns the channel this run deployed to.
    pub fn channel(&self) -> Option<&ChannelId> {
        self.channel.as_ref()
    }

    /// Returns the preview URLs found so far.
    pub fn urls(&self) -> Option<&ExtractedUrls> {
        self.extractor.cached()
    }

    /// Returns the dashboard, once the run was finalized.
    pub fn dashboard(&self) -> Option<&ConsolidatedDashboard> {
        self.dashboard.as_ref()
    }

    /// Builds a shell command in the configured working directory.
    pub(crate) fn shell(&self, line: &str) -> CommandSpec {
        let spec = CommandSpec::shell(line);
        match &self.commands.workdir {
            Some(dir) => spec.current_dir(dir),
            None => spec,
        }
    }
}
