#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod shutdown;
mod telemetry;

use std::process;
use std::sync::Arc;

use anyhow::Context;
use tally_core::run::EXIT_FAILURE;
use tally_core::{CommandRunner, ProcessRunner, WorkflowRun};
use tally_hosting::HostingProvider;
use tally_hosting::firebase::FirebaseCli;
use tally_runtime::{Engine, PipelineState, build_pipeline};
use tokio_util::sync::CancellationToken;

use crate::config::Cli;

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "tally_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "tally_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "tally_cli::config";

#[tokio::main]
async fn main() {
    let error = match run().await {
        Ok(exit_code) => process::exit(exit_code),
        Err(error) => error,
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %error,
            "Preview deployment could not start"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(EXIT_FAILURE);
}

/// Runs the pipeline and returns the process exit code.
async fn run() -> anyhow::Result<i32> {
    let cli = Cli::init();

    telemetry::init_tracing(cli.log_format)?;
    cli.validate().context("invalid configuration")?;
    cli.log();

    let engine_config = cli.engine.to_engine_config()?;
    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new());
    let provider: Arc<dyn HostingProvider> =
        Arc::new(FirebaseCli::new(Arc::clone(&runner), &cli.hosting));

    let workflow = build_pipeline(&cli.pipeline);
    let mut state = PipelineState::new(
        runner,
        provider,
        cli.hosting,
        cli.commands,
        cli.reports,
    );

    let cancel = CancellationToken::new();
    let watcher = shutdown::cancel_on_signal(cancel.clone());

    let run = Engine::new(engine_config)
        .run(&workflow, &mut state, &cancel)
        .await;
    watcher.abort();

    print_summary(&run, &state);
    Ok(run.exit_code())
}

/// Prints the end-of-run summary to standard output.
fn print_summary(run: &WorkflowRun, state: &PipelineState) {
    let summary = run.summary();

    println!(
        "Preview deployment {} in {:.1}s (exit code {})",
        summary.status,
        summary.duration.as_secs_f64(),
        summary.exit_code
    );
    for phase in &summary.phases {
        println!("  {:<16} {}", phase.name, phase.status);
    }
    if let Some(urls) = state.urls() {
        for (site, url) in &urls.sites {
            println!("  {site}: {url}");
        }
    }
    print!("{}", summary.errors);

    if state.dashboard().is_some() {
        println!("Dashboard: {}", state.reports().dashboard_path.display());
    }
}
