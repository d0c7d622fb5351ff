//! CLI configuration management.
//!
//! This module defines the complete CLI configuration hierarchy:
//!
//! ```text
//! Cli
//! ├── pipeline: PipelineConfig   # Phase skips, fail-on-quality
//! ├── hosting: HostingConfig     # Project, sites, branch, channel retention
//! ├── commands: CommandConfig    # Setup probes, auth probe, checks, build
//! ├── reports: ReportConfig      # Report artifacts, dashboard, URL cache
//! ├── engine: EngineArgs         # Retries, retry delay, phase timeout
//! └── log_format: LogFormat      # text or json
//! ```
//!
//! All configuration can be provided via CLI arguments or `TALLY_*`
//! environment variables. Use `--help` to see all available options.
//!
//! # Example
//!
//! ```bash
//! tally --keep-channels 5 --sites admin,hours --skip-quality
//!
//! # Or via environment variables
//! TALLY_KEEP_CHANNELS=5 TALLY_SKIP_QUALITY=true tally
//! ```

mod engine;

use std::process;

use anyhow::Context;
use clap::Parser;
pub use engine::EngineArgs;
use serde::{Deserialize, Serialize};
use tally_hosting::HostingConfig;
use tally_report::ReportConfig;
use tally_runtime::pipeline::{CommandConfig, PipelineConfig};

use crate::telemetry::LogFormat;
use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "tally")]
#[command(about = "Preview deployment pipeline: checks, build, deploy, channel cleanup, dashboard")]
#[command(version)]
pub struct Cli {
    /// Phase selection and failure policy.
    #[clap(flatten)]
    pub pipeline: PipelineConfig,

    /// Hosting targets and preview channel retention.
    #[clap(flatten)]
    pub hosting: HostingConfig,

    /// External commands run by the phases.
    #[clap(flatten)]
    pub commands: CommandConfig,

    /// Report artifacts and dashboard output.
    #[clap(flatten)]
    pub reports: ReportConfig,

    /// Retry and timeout policy.
    #[clap(flatten)]
    pub engine: EngineArgs,

    /// Log output format: `text` or `json`.
    #[arg(long, env = "TALLY_LOG_FORMAT", default_value = "text")]
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is loaded before clap parses arguments, so its variables
    /// act as defaults for every `env` option.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    /// Loads environment variables from .env file if the dotenv feature is enabled.
    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.pipeline
            .validate()
            .context("invalid pipeline configuration")?;
        self.hosting
            .validate()
            .context("invalid hosting configuration")?;
        self.commands
            .validate()
            .context("invalid command configuration")?;
        self.reports
            .validate()
            .context("invalid report configuration")?;
        self.engine
            .to_engine_config()
            .context("invalid engine configuration")?;
        Ok(())
    }

    /// Logs configuration (no sensitive information).
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            sites = ?self.hosting.sites,
            project = ?self.hosting.project,
            keep_channels = self.hosting.keep_channels,
            skipped = ?self.pipeline.skipped_phases(),
            fail_on_quality = self.pipeline.fail_on_quality,
            "Pipeline configuration"
        );

        tracing::debug!(
            target: TRACING_TARGET_CONFIG,
            report_dir = %self.reports.report_dir().display(),
            dashboard = %self.reports.dashboard_path.display(),
            format = %self.reports.dashboard_format,
            retries = self.engine.retries,
            phase_timeout_secs = ?self.engine.phase_timeout_secs,
            "Report and engine configuration"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn keep_channels_is_required() {
        let result = Cli::try_parse_from(["tally"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from(["tally", "--keep-channels", "5", "--skip-build"]).unwrap();
        assert_eq!(cli.hosting.keep_channels, 5);
        assert!(cli.pipeline.skip_build);
        assert_eq!(cli.log_format, LogFormat::Text);
    }
}
