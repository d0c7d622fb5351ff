//! The `report` finalizer: collect, consolidate, write the dashboard.

use tally_core::{PhaseStatus, WorkflowError, WorkflowResult, WorkflowRun};
use tally_hosting::UrlExtractor;
use tally_report::{ReportCollector, consolidate, write_dashboard};

use super::state::PipelineState;
use super::{DEPLOY, TRACING_TARGET};
use crate::engine::RunFinalizer;

/// Name under which finalizer errors are recorded.
pub const REPORT: &str = "report";

/// Builds and writes the consolidated dashboard once per run.
///
/// Runs after every phase, including after a fatal failure or cancellation,
/// and works with whatever the phases left behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportFinalizer;

#[async_trait::async_trait]
impl RunFinalizer<PipelineState> for ReportFinalizer {
    fn name(&self) -> &str {
        REPORT
    }

    async fn finalize(&self, state: &mut PipelineState, run: &WorkflowRun) -> WorkflowResult<()> {
        let deploy_skipped = run
            .phase(DEPLOY)
            .is_some_and(|phase| phase.status == PhaseStatus::Skipped);
        if state.urls().is_none() && deploy_skipped {
            load_cached_urls(state).await;
        }

        let collector = ReportCollector::new(state.reports().paths());
        let reports = collector.collect().await;
        let channels = state.registry().snapshot();
        let summary = run.summary();

        let dashboard = consolidate(&reports, &channels, &summary, state.urls());
        let path = state.reports().dashboard_path.clone();
        let format = state.reports().dashboard_format;
        let written = write_dashboard(&dashboard, format, &path).await;
        state.dashboard = Some(dashboard);

        written.map_err(WorkflowError::from)
    }
}

/// Reuses the URLs of an earlier deploy when this run did not deploy.
async fn load_cached_urls(state: &mut PipelineState) {
    let cache = state.reports().url_cache_path();
    match UrlExtractor::load(&cache).await {
        Ok(Some(urls)) => {
            tracing::info!(
                target: TRACING_TARGET,
                path = %cache.display(),
                "Using preview URLs from an earlier deploy"
            );
            state.extractor = UrlExtractor::new(state.hosting().sites.iter().cloned()).with_cached(urls);
        }
        Ok(None) => {}
        Err(error) => {
            tracing::warn!(
                target: TRACING_TARGET,
                path = %cache.display(),
                error = %error,
                "Ignoring unreadable preview URL cache"
            );
        }
    }
}
