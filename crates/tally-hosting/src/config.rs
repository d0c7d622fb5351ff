//! Hosting configuration.

use anyhow::{Result as AnyhowResult, anyhow};
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

/// Default hosting CLI binary.
pub const DEFAULT_FIREBASE_BIN: &str = "firebase";

/// Default lifetime of a preview channel.
pub const DEFAULT_CHANNEL_EXPIRY: &str = "7d";

/// Hosting targets, preview channel retention and CLI selection.
///
/// The retention count has no default: two different values were in use for
/// the same pool, so every run has to state it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct HostingConfig {
    /// Hosting project to operate on, defaults to the CLI's active project.
    #[cfg_attr(
        feature = "config",
        arg(long = "firebase-project", env = "TALLY_FIREBASE_PROJECT")
    )]
    #[serde(default)]
    pub project: Option<String>,

    /// Hosting sites to deploy, in slot order.
    #[cfg_attr(
        feature = "config",
        arg(
            long,
            env = "TALLY_SITES",
            value_delimiter = ',',
            default_value = "admin,hours"
        )
    )]
    pub sites: Vec<String>,

    /// Branch used to name preview channels, defaults to the checked-out branch.
    #[cfg_attr(feature = "config", arg(long, env = "TALLY_BRANCH"))]
    #[serde(default)]
    pub branch: Option<String>,

    /// Number of most recent preview channels kept per site.
    #[cfg_attr(feature = "config", arg(long, env = "TALLY_KEEP_CHANNELS"))]
    pub keep_channels: usize,

    /// Lifetime of newly created channels (e.g. `12h`, `7d`).
    #[cfg_attr(
        feature = "config",
        arg(long, env = "TALLY_CHANNEL_EXPIRY", default_value = DEFAULT_CHANNEL_EXPIRY)
    )]
    #[serde(default = "default_channel_expiry")]
    pub channel_expiry: String,

    /// Hosting CLI binary.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "TALLY_FIREBASE_BIN", default_value = DEFAULT_FIREBASE_BIN)
    )]
    #[serde(default = "default_firebase_bin")]
    pub firebase_bin: String,
}

fn default_channel_expiry() -> String {
    DEFAULT_CHANNEL_EXPIRY.to_owned()
}

fn default_firebase_bin() -> String {
    DEFAULT_FIREBASE_BIN.to_owned()
}

impl HostingConfig {
    /// Creates a configuration for the given sites and retention count.
    pub fn new<I, S>(sites: I, keep_channels: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            project: None,
            sites: sites.into_iter().map(Into::into).collect(),
            branch: None,
            keep_channels,
            channel_expiry: default_channel_expiry(),
            firebase_bin: default_firebase_bin(),
        }
    }

    /// Sets the hosting project.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Sets the branch used for channel names.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Validates all configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if the retention count is zero, no site is configured,
    /// a site is listed twice, or the expiry is not `<number><h|d|m>`.
    pub fn validate(&self) -> AnyhowResult<()> {
        if self.keep_channels == 0 {
            return Err(anyhow!(
                "Channel retention must keep at least one channel per site."
            ));
        }

        if self.sites.is_empty() {
            return Err(anyhow!("At least one hosting site must be configured."));
        }

        for (index, site) in self.sites.iter().enumerate() {
            if site.trim().is_empty() {
                return Err(anyhow!("Hosting site names must not be empty."));
            }
            if self.sites[..index].contains(site) {
                return Err(anyhow!("Hosting site '{site}' is listed more than once."));
            }
        }

        let valid_expiry = self
            .channel_expiry
            .strip_suffix(['h', 'd', 'm'])
            .is_some_and(|amount| !amount.is_empty() && amount.bytes().all(|b| b.is_ascii_digit()));
        if !valid_expiry {
            return Err(anyhow!(
                "Channel expiry '{}' is invalid. Use a number followed by h, d or m (e.g. 7d).",
                self.channel_expiry
            ));
        }

        Ok(())
    }
}
