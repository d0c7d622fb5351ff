//! Running configured shell commands from inside a phase.

use tally_core::{
    CommandOutput, CommandRunner, CommandSpec, ErrorCategory, ProcessError, WorkflowError,
    WorkflowResult,
};

use super::TRACING_TARGET;

/// Runs `spec` and classifies every way it can fail.
///
/// A program that cannot be started is a [`ErrorCategory::Dependency`]
/// failure whatever `category` says; timeouts and non-zero exits use
/// `category`.
pub async fn run_checked(
    runner: &dyn CommandRunner,
    spec: &CommandSpec,
    category: ErrorCategory,
) -> WorkflowResult<CommandOutput> {
    let output = runner.run(spec).await.map_err(|error| {
        let category = match &error {
            ProcessError::Spawn { .. } => ErrorCategory::Dependency,
            ProcessError::TimedOut { .. } => category,
        };
        WorkflowError::new(category, error.to_string()).with_source(error)
    })?;

    if !output.is_success() {
        tracing::debug!(
            target: TRACING_TARGET,
            command = %spec,
            exit_code = ?output.exit_code,
            "Command failed"
        );
        return Err(WorkflowError::new(category, output.describe_failure(spec)));
    }

    Ok(output)
}
