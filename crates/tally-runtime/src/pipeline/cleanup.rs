//! The channel-cleanup phase.

use serde_json::json;
use tally_core::{WorkflowError, WorkflowResult};

use super::TRACING_TARGET;
use super::state::PipelineState;
use crate::engine::{PhaseContext, PhaseOutcome, PhaseRunner};

/// Refreshes every site from the hosting backend and evicts the channels
/// beyond the retention count.
///
/// A site whose listing fails is left untouched; its channels are evicted on
/// the next run.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupPhase;

#[async_trait::async_trait]
impl PhaseRunner<PipelineState> for CleanupPhase {
    async fn run(
        &self,
        state: &mut PipelineState,
        ctx: &PhaseContext,
    ) -> WorkflowResult<PhaseOutcome> {
        let keep = state.hosting().keep_channels;
        let sites = state.hosting().sites.clone();

        let mut deleted = 0;
        let mut kept = 0;
        for site in &sites {
            if ctx.is_cancelled() {
                break;
            }

            if let Err(error) = state.registry.refresh(site).await {
                let mut error = WorkflowError::from(error);
                error.message = format!("site `{site}`: {}", error.message);
                ctx.record(error);
                continue;
            }

            let outcome = state.registry.evict(site, keep).await;
            for failure in &outcome.failed_deletions {
                ctx.record(failure.to_workflow_error());
            }
            deleted += outcome.deleted_count();
            kept += outcome.kept.len();
        }

        tracing::info!(
            target: TRACING_TARGET,
            sites = sites.len(),
            kept,
            deleted,
            "Channel cleanup finished"
        );

        if ctx.recorded() > 0 {
            return Ok(PhaseOutcome::failed());
        }
        Ok(PhaseOutcome::with_data(json!({ "kept": kept, "deleted": deleted })))
    }
}
