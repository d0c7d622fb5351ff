//! Engine configuration.

use std::time::Duration;

use derive_builder::Builder;

/// Default delay between two attempts of a phase.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Configuration for the workflow step engine.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Retries of a failed phase, unless the phase declares its own.
    #[builder(default = "0")]
    pub max_retries: u32,

    /// Delay between retries.
    #[builder(default = "DEFAULT_RETRY_DELAY")]
    pub retry_delay: Duration,

    /// Timeout of a single phase attempt, unless the phase declares its own.
    #[builder(default)]
    pub phase_timeout: Option<Duration>,
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(Some(timeout)) = self.phase_timeout
            && timeout.is_zero()
        {
            return Err("phase_timeout must be greater than zero".into());
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_delay: DEFAULT_RETRY_DELAY,
            phase_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_match_default() {
        let config = EngineConfigBuilder::default().build().unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let result = EngineConfigBuilder::default()
            .phase_timeout(Duration::ZERO)
            .build();
        assert!(result.is_err());

        let config = EngineConfigBuilder::default()
            .max_retries(2u32)
            .phase_timeout(Duration::from_secs(30))
            .build()
            .unwrap();
        assert_eq!(config.phase_timeout, Some(Duration::from_secs(30)));
    }
}
