//! Retry and timeout options of the step engine.

use std::time::Duration;

use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};
use tally_runtime::engine::{EngineConfig, EngineConfigBuilder};

/// Engine options as they appear on the command line.
#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct EngineArgs {
    /// Retries of a failed phase.
    #[arg(long, env = "TALLY_RETRIES", default_value_t = 0)]
    #[serde(default)]
    pub retries: u32,

    /// Delay between retries, in seconds.
    #[arg(long, env = "TALLY_RETRY_DELAY_SECS", default_value_t = 2)]
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Timeout of a single phase attempt, in seconds. No timeout by default.
    #[arg(long, env = "TALLY_PHASE_TIMEOUT_SECS")]
    #[serde(default)]
    pub phase_timeout_secs: Option<u64>,
}

fn default_retry_delay_secs() -> u64 {
    2
}

impl EngineArgs {
    /// Builds the engine configuration.
    pub fn to_engine_config(&self) -> anyhow::Result<EngineConfig> {
        EngineConfigBuilder::default()
            .max_retries(self.retries)
            .retry_delay(Duration::from_secs(self.retry_delay_secs))
            .phase_timeout(self.phase_timeout_secs.map(Duration::from_secs))
            .build()
            .context("phase timeout must be at least one second")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_is_rejected() {
        let args = EngineArgs {
            retries: 1,
            retry_delay_secs: 0,
            phase_timeout_secs: Some(0),
        };
        assert!(args.to_engine_config().is_err());

        let args = EngineArgs {
            phase_timeout_secs: Some(600),
            ..args
        };
        let config = args.to_engine_config().unwrap();
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.phase_timeout, Some(Duration::from_secs(600)));
    }
}
