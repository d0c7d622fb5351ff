//! Pipeline configuration: which phases run and which commands they invoke.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Result as AnyhowResult, anyhow};
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use super::{AUTH, BUILD, CHANNEL_CLEANUP, DEPLOY, PHASE_NAMES, QUALITY_CHECKS};

/// Default dependency probes, run before anything else.
pub const DEFAULT_SETUP_PROBES: &str = "node --version;npm --version;firebase --version";

/// Default authentication probe.
pub const DEFAULT_AUTH_PROBE: &str = "firebase login:list";

/// Default quality checks.
pub const DEFAULT_QUALITY_CHECKS: &str = "npm run lint;npm run typecheck";

/// Default build command.
pub const DEFAULT_BUILD_COMMAND: &str = "npm run build";

/// Phase selection and failure policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct PipelineConfig {
    /// Skip the hosting CLI authentication check.
    #[cfg_attr(feature = "config", arg(long, env = "TALLY_SKIP_AUTH"))]
    #[serde(default)]
    pub skip_auth: bool,

    /// Skip lint, type and test checks.
    #[cfg_attr(feature = "config", arg(long, env = "TALLY_SKIP_QUALITY"))]
    #[serde(default)]
    pub skip_quality: bool,

    /// Skip the build and deploy what is already built.
    #[cfg_attr(feature = "config", arg(long, env = "TALLY_SKIP_BUILD"))]
    #[serde(default)]
    pub skip_build: bool,

    /// Skip deploying to preview channels.
    #[cfg_attr(feature = "config", arg(long, env = "TALLY_SKIP_DEPLOY"))]
    #[serde(default)]
    pub skip_deploy: bool,

    /// Skip the eviction of old preview channels.
    #[cfg_attr(feature = "config", arg(long, env = "TALLY_SKIP_CLEANUP"))]
    #[serde(default)]
    pub skip_cleanup: bool,

    /// Additional phases to skip, by name.
    #[cfg_attr(
        feature = "config",
        arg(long = "skip", env = "TALLY_SKIP_PHASES", value_delimiter = ',')
    )]
    #[serde(default)]
    pub skip: Vec<String>,

    /// Halt the run when a quality check fails.
    #[cfg_attr(feature = "config", arg(long, env = "TALLY_FAIL_ON_QUALITY"))]
    #[serde(default)]
    pub fail_on_quality: bool,
}

impl PipelineConfig {
    /// Returns the names of every phase that should not run.
    pub fn skipped_phases(&self) -> BTreeSet<String> {
        let flags = [
            (self.skip_auth, AUTH),
            (self.skip_quality, QUALITY_CHECKS),
            (self.skip_build, BUILD),
            (self.skip_deploy, DEPLOY),
            (self.skip_cleanup, CHANNEL_CLEANUP),
        ];

        flags
            .into_iter()
            .filter(|(skip, _)| *skip)
            .map(|(_, name)| name.to_owned())
            .chain(self.skip.iter().cloned())
            .collect()
    }

    /// Validates all configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if `--skip` names an unknown phase.
    pub fn validate(&self) -> AnyhowResult<()> {
        for name in &self.skip {
            if !PHASE_NAMES.contains(&name.as_str()) {
                return Err(anyhow!(
                    "Unknown phase '{name}' in --skip. Known phases: {}.",
                    PHASE_NAMES.join(", ")
                ));
            }
        }
        Ok(())
    }
}

/// External commands the phases invoke, as shell command lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct CommandConfig {
    /// Dependency probes, separated by `;`.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "setup-probe",
            env = "TALLY_SETUP_PROBES",
            value_delimiter = ';',
            default_value = DEFAULT_SETUP_PROBES
        )
    )]
    pub setup_probes: Vec<String>,

    /// Command that fails when the hosting CLI is not authenticated.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "TALLY_AUTH_PROBE", default_value = DEFAULT_AUTH_PROBE)
    )]
    pub auth_probe: String,

    /// Quality checks, separated by `;`. Each may write a report artifact.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "quality-check",
            env = "TALLY_QUALITY_CHECKS",
            value_delimiter = ';',
            default_value = DEFAULT_QUALITY_CHECKS
        )
    )]
    pub quality_checks: Vec<String>,

    /// Build command.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "TALLY_BUILD_COMMAND", default_value = DEFAULT_BUILD_COMMAND)
    )]
    pub build_command: String,

    /// Working directory of every command, defaults to the current one.
    #[cfg_attr(feature = "config", arg(long, env = "TALLY_WORKDIR"))]
    #[serde(default)]
    pub workdir: Option<PathBuf>,
}

fn split_commands(commands: &str) -> Vec<String> {
    commands
        .split(';')
        .map(str::trim)
        .filter(|command| !command.is_empty())
        .map(str::to_owned)
        .collect()
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            setup_probes: split_commands(DEFAULT_SETUP_PROBES),
            auth_probe: DEFAULT_AUTH_PROBE.to_owned(),
            quality_checks: split_commands(DEFAULT_QUALITY_CHECKS),
            build_command: DEFAULT_BUILD_COMMAND.to_owned(),
            workdir: None,
        }
    }
}

impl CommandConfig {
    /// Validates all configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if a required command is blank or the working
    /// directory does not exist.
    pub fn validate(&self) -> AnyhowResult<()> {
        if self.auth_probe.trim().is_empty() {
            return Err(anyhow!("Authentication probe must not be empty."));
        }

        if self.build_command.trim().is_empty() {
            return Err(anyhow!("Build command must not be empty."));
        }

        if let Some(workdir) = &self.workdir
            && !workdir.is_dir()
        {
            return Err(anyhow!(
                "Working directory '{}' does not exist.",
                workdir.display()
            ));
        }

        Ok(())
    }
}
