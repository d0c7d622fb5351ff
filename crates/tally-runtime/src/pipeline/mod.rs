//! The preview deployment pipeline.
//!
//! Six phases run in order on a [`PipelineState`]:
//!
//! | phase             | fatal                  | skippable |
//! |-------------------|------------------------|-----------|
//! | `setup`           | yes                    | no        |
//! | `auth`            | yes                    | yes       |
//! | `quality-checks`  | with `fail_on_quality` | yes       |
//! | `build`           | yes                    | yes       |
//! | `deploy`          | yes                    | yes       |
//! | `channel-cleanup` | no                     | yes       |
//!
//! The [`ReportFinalizer`] then writes the dashboard, whatever happened.

mod checks;
mod cleanup;
mod command;
mod config;
mod deploy;
mod report;
mod state;

use tally_core::ErrorCategory;

pub use self::checks::{AuthPhase, BuildPhase, QualityPhase, REPORT_DIR_ENV, SetupPhase};
pub use self::cleanup::CleanupPhase;
pub use self::command::run_checked;
pub use self::config::{
    CommandConfig, DEFAULT_AUTH_PROBE, DEFAULT_BUILD_COMMAND, DEFAULT_QUALITY_CHECKS,
    DEFAULT_SETUP_PROBES, PipelineConfig,
};
pub use self::deploy::DeployPhase;
pub use self::report::{REPORT, ReportFinalizer};
pub use self::state::PipelineState;
use crate::engine::{PhaseDefinition, Workflow};

/// Tracing target for the pipeline phases.
pub const TRACING_TARGET: &str = "tally_runtime::pipeline";

/// Dependency probes.
pub const SETUP: &str = "setup";
/// Hosting CLI authentication check.
pub const AUTH: &str = "auth";
/// Lint, type and test checks.
pub const QUALITY_CHECKS: &str = "quality-checks";
/// Production build.
pub const BUILD: &str = "build";
/// Deployment to preview channels.
pub const DEPLOY: &str = "deploy";
/// Eviction of old preview channels.
pub const CHANNEL_CLEANUP: &str = "channel-cleanup";

/// Every phase name, in execution order.
pub const PHASE_NAMES: [&str; 6] = [SETUP, AUTH, QUALITY_CHECKS, BUILD, DEPLOY, CHANNEL_CLEANUP];

/// Assembles the pipeline for the given configuration.
pub fn build_pipeline(config: &PipelineConfig) -> Workflow<PipelineState> {
    Workflow::new()
        .phase(PhaseDefinition::new(SETUP, SetupPhase).with_category(ErrorCategory::Dependency))
        .phase(
            PhaseDefinition::new(AUTH, AuthPhase)
                .skippable()
                .with_category(ErrorCategory::Authentication),
        )
        .phase(
            PhaseDefinition::new(QUALITY_CHECKS, QualityPhase)
                .fatal(config.fail_on_quality)
                .skippable()
                .with_category(ErrorCategory::QualityCheck),
        )
        .phase(
            PhaseDefinition::new(BUILD, BuildPhase)
                .skippable()
                .with_category(ErrorCategory::Build),
        )
        .phase(
            PhaseDefinition::new(DEPLOY, DeployPhase)
                .skippable()
                .with_category(ErrorCategory::Deployment),
        )
        .phase(
            PhaseDefinition::new(CHANNEL_CLEANUP, CleanupPhase)
                .fatal(false)
                .skippable()
                .with_category(ErrorCategory::Deployment),
        )
        .skip_all(config.skipped_phases())
        .finalizer(ReportFinalizer)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::{Arc, Mutex, PoisonError};

    use jiff::Timestamp;
    use tally_core::mock::ScriptedRunner;
    use tally_core::{CommandOutput, CommandRunner, PhaseStatus, RunStatus};
    use tally_hosting::{
        ChannelId, HostingConfig, HostingError, HostingProvider, HostingResult, PreviewChannel,
        UrlExtractor,
    };
    use tally_report::{DashboardFormat, ReportConfig};
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::engine::Engine;

    #[derive(Debug, Default)]
    struct FakeState {
        channels: Vec<PreviewChannel>,
        deploy_outputs: BTreeMap<String, String>,
        failing_deploys: BTreeSet<String>,
        failing_deletes: BTreeSet<String>,
        failing_lists: BTreeSet<String>,
        deployed: Vec<String>,
        deleted: Vec<String>,
    }

    /// In-memory hosting backend.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct FakeHosting {
        inner: Arc<Mutex<FakeState>>,
    }

    impl FakeHosting {
        fn with(self, f: impl FnOnce(&mut FakeState)) -> Self {
            f(&mut self.lock());
            self
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
            self.inner.lock().unwrap_or_else(PoisonError::into_inner)
        }

        pub(crate) fn with_channels(self, channels: impl IntoIterator<Item = PreviewChannel>) -> Self {
            self.with(|state| state.channels.extend(channels))
        }

        pub(crate) fn with_deploy_output(self, site: &str, output: &str) -> Self {
            self.with(|state| {
                state.deploy_outputs.insert(site.to_owned(), output.to_owned());
            })
        }

        pub(crate) fn failing_deploy(self, site: &str) -> Self {
            self.with(|state| {
                state.failing_deploys.insert(site.to_owned());
            })
        }

        pub(crate) fn failing_delete(self, id: &str) -> Self {
            self.with(|state| {
                state.failing_deletes.insert(id.to_owned());
            })
        }

        pub(crate) fn failing_list(self, site: &str) -> Self {
            self.with(|state| {
                state.failing_lists.insert(site.to_owned());
            })
        }

        pub(crate) fn deployed(&self) -> Vec<String> {
            self.lock().deployed.clone()
        }

        pub(crate) fn deleted(&self) -> Vec<String> {
            self.lock().deleted.clone()
        }
    }

    #[async_trait::async_trait]
    impl HostingProvider for FakeHosting {
        async fn list_channels(&self, site: &str) -> HostingResult<Vec<PreviewChannel>> {
            let state = self.lock();
            if state.failing_lists.contains(site) {
                return Err(HostingError::command_failed("list channels", "HTTP Error: 500"));
            }
            Ok(state
                .channels
                .iter()
                .filter(|channel| channel.site == site)
                .cloned()
                .collect())
        }

        async fn create_channel(&self, id: &ChannelId, site: &str) -> HostingResult<PreviewChannel> {
            let channel = PreviewChannel::new(id.clone(), site, Timestamp::now());
            self.lock().channels.push(channel.clone());
            Ok(channel)
        }

        async fn deploy_to_channel(
            &self,
            _id: &ChannelId,
            site: &str,
        ) -> HostingResult<CommandOutput> {
            let mut state = self.lock();
            if state.failing_deploys.contains(site) {
                return Err(HostingError::command_failed("deploy channel", "Error: quota exceeded"));
            }
            state.deployed.push(site.to_owned());
            let output = state.deploy_outputs.get(site).cloned().unwrap_or_default();
            Ok(CommandOutput::success(output))
        }

        async fn delete_channel(&self, id: &ChannelId, site: &str) -> HostingResult<()> {
            let mut state = self.lock();
            if state.failing_deletes.contains(id.as_str()) {
                return Err(HostingError::command_failed("delete channel", "HTTP Error: 404"));
            }
            state
                .channels
                .retain(|channel| !(channel.id == *id && channel.site == site));
            state.deleted.push(id.to_string());
            Ok(())
        }
    }

    /// Pipeline state over fakes, with reports in a fresh directory.
    pub(crate) fn state_with(
        runner: Arc<dyn CommandRunner>,
        hosting: FakeHosting,
    ) -> (PipelineState, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let hosting_config = HostingConfig::new(["admin", "hours"], 2).with_branch("feature/login");
        let reports = ReportConfig::default()
            .with_report_dir(dir.path())
            .with_dashboard(dir.path().join("dashboard.md"), DashboardFormat::Markdown);
        let started_at = Timestamp::from_second(1_704_164_645).unwrap();

        let state = PipelineState::new(
            runner,
            Arc::new(hosting),
            hosting_config,
            CommandConfig::default(),
            reports,
        )
        .with_started_at(started_at);
        (state, dir)
    }

    fn deploying_hosting() -> FakeHosting {
        FakeHosting::default()
            .with_deploy_output("admin", "- https://admin-x--feature-login.web.app")
            .with_deploy_output("hours", "- https://hours-x--feature-login.web.app")
    }

    #[tokio::test]
    async fn full_run_writes_dashboard_and_url_cache() {
        let hosting = deploying_hosting();
        let (mut state, dir) = state_with(Arc::new(ScriptedRunner::new()), hosting.clone());
        let workflow = build_pipeline(&PipelineConfig::default());

        let run = Engine::default()
            .run(&workflow, &mut state, &CancellationToken::new())
            .await;

        assert_eq!(run.status(), RunStatus::Succeeded);
        assert_eq!(run.exit_code(), 0);
        assert!(run.phases().iter().all(|p| p.status == PhaseStatus::Succeeded));
        assert_eq!(hosting.deployed(), vec!["admin", "hours"]);

        let dashboard = std::fs::read_to_string(dir.path().join("dashboard.md")).unwrap();
        assert!(dashboard.contains("admin-x--feature-login.web.app"));
        assert!(dir.path().join(tally_report::URL_CACHE_FILE_NAME).exists());
        assert!(state.dashboard().is_some());
    }

    #[tokio::test]
    async fn failed_build_halts_before_deploy_but_still_reports() {
        let runner = ScriptedRunner::new().on("npm run build", CommandOutput::failure(1, "tsc: 4 errors"));
        let hosting = deploying_hosting();
        let (mut state, dir) = state_with(Arc::new(runner), hosting.clone());
        let workflow = build_pipeline(&PipelineConfig::default());

        let run = Engine::default()
            .run(&workflow, &mut state, &CancellationToken::new())
            .await;

        assert_eq!(run.exit_code(), 1);
        assert_eq!(run.phase(BUILD).unwrap().status, PhaseStatus::Failed);
        assert_eq!(run.phase(DEPLOY).unwrap().status, PhaseStatus::Skipped);
        assert_eq!(run.phase(CHANNEL_CLEANUP).unwrap().status, PhaseStatus::Skipped);
        assert!(hosting.deployed().is_empty());

        let summary = run.errors().summarize();
        assert_eq!(summary.groups.len(), 1);
        assert!(dir.path().join("dashboard.md").exists());
    }

    #[tokio::test]
    async fn skipped_deploy_reuses_cached_urls() {
        let (mut state, dir) = state_with(Arc::new(ScriptedRunner::new()), FakeHosting::default());

        let mut earlier = UrlExtractor::new(["admin", "hours"]);
        earlier.extract(["- https://admin-x--earlier.web.app"]);
        earlier
            .persist(&dir.path().join(tally_report::URL_CACHE_FILE_NAME))
            .await
            .unwrap();

        let config = PipelineConfig {
            skip_deploy: true,
            skip_cleanup: true,
            ..PipelineConfig::default()
        };
        let run = Engine::default()
            .run(&build_pipeline(&config), &mut state, &CancellationToken::new())
            .await;

        assert_eq!(run.exit_code(), 0);
        let urls = state.urls().unwrap();
        assert!(urls.get("admin").is_some());
        let dashboard = std::fs::read_to_string(dir.path().join("dashboard.md")).unwrap();
        assert!(dashboard.contains("admin-x--earlier.web.app"));
    }

    #[test]
    fn quality_failures_are_fatal_only_on_request() {
        let lenient = build_pipeline(&PipelineConfig::default());
        let strict = build_pipeline(&PipelineConfig {
            fail_on_quality: true,
            ..PipelineConfig::default()
        });

        let quality = |workflow: &Workflow<PipelineState>| {
            workflow
                .phases()
                .iter()
                .find(|phase| phase.name() == QUALITY_CHECKS)
                .map(PhaseDefinition::is_fatal)
        };
        assert_eq!(quality(&lenient), Some(false));
        assert_eq!(quality(&strict), Some(true));
        assert_eq!(
            lenient.phases().iter().map(PhaseDefinition::name).collect::<Vec<_>>(),
            PHASE_NAMES
        );
    }
}
