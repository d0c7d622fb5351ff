//! The deploy phase: one channel per site, then URL extraction.

use futures::future::join_all;
use serde_json::json;
use tally_core::{CommandOutput, CommandSpec, WorkflowError, WorkflowResult};
use tally_hosting::{ChannelId, HostingProvider, HostingResult, PreviewChannel};

use super::TRACING_TARGET;
use super::state::PipelineState;
use crate::engine::{PhaseContext, PhaseOutcome, PhaseRunner};

/// Deploys every configured site to a fresh preview channel.
///
/// Sites are deployed concurrently and independently; one failing site does
/// not stop the others, but fails the phase once all of them returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployPhase;

#[async_trait::async_trait]
impl PhaseRunner<PipelineState> for DeployPhase {
    async fn run(
        &self,
        state: &mut PipelineState,
        ctx: &PhaseContext,
    ) -> WorkflowResult<PhaseOutcome> {
        let branch = resolve_branch(state).await;
        let id = ChannelId::for_branch(&branch, state.started_at());
        state.channel = Some(id.clone());

        tracing::info!(target: TRACING_TARGET, channel = %id, branch = %branch, "Deploying preview channel");

        let provider = state.registry().provider().clone();
        let sites = state.hosting().sites.clone();
        let deploys = sites.iter().map(|site| {
            let provider = provider.as_ref();
            let id = &id;
            async move { (site, deploy_site(provider, id, site).await) }
        });

        let mut deployed = Vec::with_capacity(sites.len());
        for (site, result) in join_all(deploys).await {
            match result {
                Ok(pair) => deployed.push(pair),
                Err(error) => {
                    let mut error = WorkflowError::from(error);
                    error.message = format!("site `{site}`: {}", error.message);
                    ctx.record(error);
                }
            }
        }
        let failed = sites.len() - deployed.len();

        let texts: Vec<String> = deployed.iter().map(|(_, output)| output.combined()).collect();
        let mut urls = state.extractor.extract(texts.iter().map(String::as_str));
        if urls.is_none() {
            let logs = state.reports().deploy_logs.clone();
            urls = state.extractor.extract_from_files(&logs).await;
        }

        if urls.is_none() && !deployed.is_empty() {
            ctx.record(WorkflowError::deployment(
                "no preview URLs found in the deployment output or log files",
            ));
        }

        for (channel, _) in deployed {
            let url = urls.as_ref().and_then(|urls| urls.get(&channel.site)).cloned();
            let channel = match url {
                Some(url) => channel.with_url(url),
                None => channel,
            };
            state.registry.record_created(channel);
        }

        if urls.is_some() {
            let cache = state.reports().url_cache_path();
            if let Err(error) = state.extractor.persist(&cache).await {
                ctx.record(WorkflowError::from(error));
            }
        }

        if failed > 0 {
            return Ok(PhaseOutcome::failed());
        }

        Ok(PhaseOutcome::with_data(json!({
            "channel": id,
            "sites": sites,
            "urls": urls.map(|urls| urls.sites),
        })))
    }
}

async fn deploy_site(
    provider: &dyn HostingProvider,
    id: &ChannelId,
    site: &str,
) -> HostingResult<(PreviewChannel, CommandOutput)> {
    let channel = provider.create_channel(id, site).await?;
    let output = provider.deploy_to_channel(id, site).await?;

    tracing::debug!(
        target: TRACING_TARGET,
        site,
        channel = %id,
        duration_ms = output.duration.as_millis(),
        "Deployed site"
    );

    Ok((channel, output))
}

/// Returns the configured branch, else the checked-out one, else an empty
/// string that channel ids turn into a generic name.
async fn resolve_branch(state: &PipelineState) -> String {
    if let Some(branch) = &state.hosting().branch {
        return branch.clone();
    }

    let mut spec = CommandSpec::new("git").args(["rev-parse", "--abbrev-ref", "HEAD"]);
    if let Some(dir) = &state.commands().workdir {
        spec = spec.current_dir(dir);
    }

    match state.runner().run(&spec).await {
        Ok(output) if output.is_success() => {
            let branch = output.stdout.trim();
            if branch == "HEAD" {
                String::new()
            } else {
                branch.to_owned()
            }
        }
        Ok(_) | Err(_) => {
            tracing::debug!(target: TRACING_TARGET, "Could not determine the current branch");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tally_core::ErrorCategory;
    use tally_core::mock::ScriptedRunner;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::pipeline::tests::{FakeHosting, state_with};

    #[tokio::test]
    async fn every_site_is_deployed_and_urls_attached() {
        let hosting = FakeHosting::default().with_deploy_output(
            "admin",
            "✔  hosting:channel: Channel URL (admin): https://admin-x--feature-20240102030405-abc.web.app [expires 2024-01-09]",
        );
        let runner = Arc::new(ScriptedRunner::new());
        let (mut state, _dir) = state_with(runner, hosting.clone());
        let ctx = PhaseContext::new("deploy", 1, CancellationToken::new());

        let outcome = DeployPhase.run(&mut state, &ctx).await.unwrap();

        assert!(matches!(outcome, PhaseOutcome::Succeeded(Some(_))));
        assert_eq!(ctx.recorded(), 0);
        assert_eq!(hosting.deployed(), vec!["admin", "hours"]);

        let channel = state.channel().unwrap().clone();
        assert!(channel.as_str().starts_with("feature-login-"));
        let admin = &state.registry().channels("admin")[0];
        assert_eq!(admin.id, channel);
        assert!(admin.url().is_some());
        assert!(state.urls().is_some());
    }

    #[tokio::test]
    async fn one_failing_site_does_not_stop_the_other() {
        let hosting = FakeHosting::default()
            .failing_deploy("admin")
            .with_deploy_output("hours", "- https://hours-x--feature-1.web.app");
        let runner = Arc::new(ScriptedRunner::new());
        let (mut state, _dir) = state_with(runner, hosting.clone());
        let ctx = PhaseContext::new("deploy", 1, CancellationToken::new());

        let outcome = DeployPhase.run(&mut state, &ctx).await.unwrap();

        assert_eq!(outcome, PhaseOutcome::Failed);
        assert_eq!(hosting.deployed(), vec!["hours"]);
        let errors = ctx.take_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category, ErrorCategory::Deployment);
        assert!(errors[0].message.contains("site `admin`"));
        assert_eq!(state.registry().channels("hours").len(), 1);
    }

    #[tokio::test]
    async fn missing_urls_are_reported_without_failing() {
        let runner = Arc::new(ScriptedRunner::new());
        let (mut state, _dir) = state_with(runner, FakeHosting::default());
        let ctx = PhaseContext::new("deploy", 1, CancellationToken::new());

        let outcome = DeployPhase.run(&mut state, &ctx).await.unwrap();

        assert!(matches!(outcome, PhaseOutcome::Succeeded(_)));
        assert_eq!(ctx.recorded(), 1);
    }

    #[tokio::test]
    async fn branch_falls_back_to_git() {
        let runner = Arc::new(
            ScriptedRunner::new().on("rev-parse", CommandOutput::success("fix/Header\n")),
        );
        let (mut state, _dir) = state_with(runner, FakeHosting::default());
        state.hosting.branch = None;

        assert_eq!(resolve_branch(&state).await, "fix/Header");
    }
}
