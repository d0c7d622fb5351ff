//! Hosting provider backed by the Firebase CLI.

use std::sync::Arc;

use jiff::Timestamp;
use tally_core::{CommandOutput, CommandRunner, CommandSpec};

use super::TRACING_TARGET;
use super::listing::parse_channel_list;
use crate::channel::{ChannelId, PreviewChannel};
use crate::config::HostingConfig;
use crate::error::{HostingError, HostingResult};
use crate::provider::HostingProvider;

struct FirebaseCliInner {
    runner: Arc<dyn CommandRunner>,
    binary: String,
    project: Option<String>,
    expires: String,
}

/// [`HostingProvider`] that shells out to `firebase hosting:channel:*`.
///
/// Cloning is cheap; all clones share the same runner.
#[derive(Clone)]
pub struct FirebaseCli {
    inner: Arc<FirebaseCliInner>,
}

impl std::fmt::Debug for FirebaseCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseCli")
            .field("binary", &self.inner.binary)
            .field("project", &self.inner.project)
            .field("expires", &self.inner.expires)
            .finish_non_exhaustive()
    }
}

impl FirebaseCli {
    /// Creates a provider using the binary, project and expiry from `config`.
    pub fn new(runner: Arc<dyn CommandRunner>, config: &HostingConfig) -> Self {
        let inner = FirebaseCliInner {
            runner,
            binary: config.firebase_bin.clone(),
            project: config.project.clone(),
            expires: config.channel_expiry.clone(),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    fn command<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = CommandSpec::new(&self.inner.binary).args(args);
        match &self.inner.project {
            Some(project) => spec.arg("--project").arg(project),
            None => spec,
        }
    }

    async fn execute(&self, operation: &'static str, spec: CommandSpec) -> HostingResult<CommandOutput> {
        tracing::debug!(target: TRACING_TARGET, operation, command = %spec, "Invoking hosting CLI");

        let output = self
            .inner
            .runner
            .run(&spec)
            .await
            .map_err(|source| HostingError::Process { operation, source })?;

        if !output.is_success() {
            let message = output.describe_failure(&spec);
            return Err(HostingError::command_failed(operation, message));
        }

        Ok(output)
    }
}

#[async_trait::async_trait]
impl HostingProvider for FirebaseCli {
    async fn list_channels(&self, site: &str) -> HostingResult<Vec<PreviewChannel>> {
        let spec = self.command(["hosting:channel:list", "--site", site, "--json"]);
        let output = self.execute("list channels", spec).await?;
        let channels = parse_channel_list(site, &output.stdout)?;

        tracing::debug!(
            target: TRACING_TARGET,
            site,
            channels = channels.len(),
            "Listed preview channels"
        );

        Ok(channels)
    }

    async fn create_channel(&self, id: &ChannelId, site: &str) -> HostingResult<PreviewChannel> {
        let spec = self.command([
            "hosting:channel:create",
            id.as_str(),
            "--site",
            site,
            "--expires",
            self.inner.expires.as_str(),
        ]);
        self.execute("create channel", spec).await?;

        Ok(PreviewChannel::new(id.clone(), site, Timestamp::now()))
    }

    async fn deploy_to_channel(
        &self,
        id: &ChannelId,
        site: &str,
    ) -> HostingResult<CommandOutput> {
        let spec = self.command([
            "hosting:channel:deploy",
            id.as_str(),
            "--only",
            site,
            "--expires",
            self.inner.expires.as_str(),
        ]);
        self.execute("deploy channel", spec).await
    }

    async fn delete_channel(&self, id: &ChannelId, site: &str) -> HostingResult<()> {
        let spec = self.command([
            "hosting:channel:delete",
            id.as_str(),
            "--site",
            site,
            "--force",
        ]);
        self.execute("delete channel", spec).await?;
        Ok(())
    }
}
