//! Phases that only run local commands: setup, auth, quality checks and build.

use futures::future::join_all;
use serde_json::json;
use tally_core::{ErrorCategory, WorkflowError, WorkflowResult};

use super::TRACING_TARGET;
use super::command::run_checked;
use super::state::PipelineState;
use crate::engine::{PhaseContext, PhaseOutcome, PhaseRunner};

/// Output of an auth probe that exits zero without any logged-in account.
const NO_ACCOUNT_MARKERS: &[&str] = &["No authorized accounts", "not logged in"];

/// Environment variable telling quality checks where to write their reports.
pub const REPORT_DIR_ENV: &str = "TALLY_REPORT_DIR";

/// Verifies that every required tool can be started.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetupPhase;

#[async_trait::async_trait]
impl PhaseRunner<PipelineState> for SetupPhase {
    async fn run(
        &self,
        state: &mut PipelineState,
        ctx: &PhaseContext,
    ) -> WorkflowResult<PhaseOutcome> {
        let state = &*state;
        let probes = state.commands().setup_probes.iter().map(|line| async move {
            let spec = state.shell(line);
            let result = run_checked(state.runner(), &spec, ErrorCategory::Dependency).await;
            (line, result)
        });

        let mut tools = Vec::new();
        for (line, result) in join_all(probes).await {
            match result {
                Ok(output) => {
                    let version = output.stdout.lines().next().unwrap_or_default().trim();
                    tracing::debug!(target: TRACING_TARGET, probe = %line, version, "Dependency available");
                    tools.push(json!({ "probe": line, "version": version }));
                }
                Err(error) => ctx.record(error),
            }
        }

        if ctx.recorded() > 0 {
            return Ok(PhaseOutcome::failed());
        }
        Ok(PhaseOutcome::with_data(json!({ "tools": tools })))
    }
}

/// Verifies that the hosting CLI holds valid credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthPhase;

#[async_trait::async_trait]
impl PhaseRunner<PipelineState> for AuthPhase {
    async fn run(
        &self,
        state: &mut PipelineState,
        _ctx: &PhaseContext,
    ) -> WorkflowResult<PhaseOutcome> {
        let spec = state.shell(&state.commands().auth_probe);
        let output = run_checked(state.runner(), &spec, ErrorCategory::Authentication).await?;

        let combined = output.combined();
        if NO_ACCOUNT_MARKERS.iter().any(|marker| combined.contains(marker)) {
            return Err(WorkflowError::authentication(format!(
                "`{spec}` reported no authenticated account"
            )));
        }

        Ok(PhaseOutcome::succeeded())
    }
}

/// Runs the configured quality checks concurrently.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityPhase;

#[async_trait::async_trait]
impl PhaseRunner<PipelineState> for QualityPhase {
    async fn run(
        &self,
        state: &mut PipelineState,
        ctx: &PhaseContext,
    ) -> WorkflowResult<PhaseOutcome> {
        let state = &*state;
        if state.commands().quality_checks.is_empty() {
            return Ok(PhaseOutcome::skipped("no quality checks configured"));
        }

        let report_dir = state.reports().report_dir().display().to_string();
        let checks = state.commands().quality_checks.iter().map(|line| {
            let spec = state.shell(line).env(REPORT_DIR_ENV, report_dir.as_str());
            async move { run_checked(state.runner(), &spec, ErrorCategory::QualityCheck).await }
        });

        let total = state.commands().quality_checks.len();
        let mut passed = 0;
        for result in join_all(checks).await {
            match result {
                Ok(_) => passed += 1,
                Err(error) => ctx.record(error),
            }
        }

        tracing::info!(
            target: TRACING_TARGET,
            passed,
            failed = total - passed,
            "Quality checks finished"
        );

        if passed < total {
            return Ok(PhaseOutcome::failed());
        }
        Ok(PhaseOutcome::with_data(json!({ "passed": passed })))
    }
}

/// Runs the build command.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildPhase;

#[async_trait::async_trait]
impl PhaseRunner<PipelineState> for BuildPhase {
    async fn run(
        &self,
        state: &mut PipelineState,
        _ctx: &PhaseContext,
    ) -> WorkflowResult<PhaseOutcome> {
        let spec = state.shell(&state.commands().build_command);
        let output = run_checked(state.runner(), &spec, ErrorCategory::Build).await?;

        Ok(PhaseOutcome::with_data(json!({
            "duration_ms": u64::try_from(output.duration.as_millis()).unwrap_or(u64::MAX),
        })))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tally_core::CommandOutput;
    use tally_core::mock::ScriptedRunner;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::pipeline::tests::{FakeHosting, state_with};

    fn ctx(phase: &str) -> PhaseContext {
        PhaseContext::new(phase, 1, CancellationToken::new())
    }

    #[tokio::test]
    async fn setup_records_every_missing_tool() {
        let runner = Arc::new(ScriptedRunner::new().missing("node").missing("firebase"));
        let (mut state, _dir) = state_with(runner, FakeHosting::default());
        let ctx = ctx("setup");

        let outcome = SetupPhase.run(&mut state, &ctx).await.unwrap();

        assert_eq!(outcome, PhaseOutcome::Failed);
        let errors = ctx.take_errors();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.category == ErrorCategory::Dependency));
    }

    #[tokio::test]
    async fn auth_rejects_probe_without_accounts() {
        let runner = Arc::new(
            ScriptedRunner::new().on("login:list", CommandOutput::success("No authorized accounts.")),
        );
        let (mut state, _dir) = state_with(runner, FakeHosting::default());

        let error = AuthPhase.run(&mut state, &ctx("auth")).await.unwrap_err();
        assert_eq!(error.category, ErrorCategory::Authentication);
    }

    #[tokio::test]
    async fn quality_checks_all_run_and_see_the_report_dir() {
        let runner = Arc::new(ScriptedRunner::new().on("lint", CommandOutput::failure(1, "3 problems")));
        let (mut state, _dir) = state_with(runner.clone(), FakeHosting::default());
        let ctx = ctx("quality-checks");

        let outcome = QualityPhase.run(&mut state, &ctx).await.unwrap();

        assert_eq!(outcome, PhaseOutcome::Failed);
        assert_eq!(ctx.recorded(), 1);
        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|spec| spec.env.contains_key(REPORT_DIR_ENV)));
    }

    #[tokio::test]
    async fn build_failure_is_a_build_error() {
        let runner = Arc::new(ScriptedRunner::new().on("build", CommandOutput::failure(1, "vite: error")));
        let (mut state, _dir) = state_with(runner, FakeHosting::default());

        let error = BuildPhase.run(&mut state, &ctx("build")).await.unwrap_err();
        assert_eq!(error.category, ErrorCategory::Build);
    }
}
