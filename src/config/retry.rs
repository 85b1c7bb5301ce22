//! Retry configuration for billing API calls

use serde::Deserialize;

use super::error::ValidationError;

/// Exponential backoff for rate-limited and dropped Stripe requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: u32,

    /// A retry whose delay would exceed this gives up instead.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Extra attempts after a transport failure.
    #[serde(default = "default_max_network_retries")]
    pub max_network_retries: u32,
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_multiplier() -> u32 {
    2
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_network_retries() -> u32 {
    2
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            max_network_retries: default_max_network_retries(),
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.initial_delay_ms == 0 {
            return Err(ValidationError::InvalidRetryPolicy("initial_delay_ms must be positive"));
        }
        if self.multiplier < 2 {
            return Err(ValidationError::InvalidRetryPolicy("multiplier must be at least 2"));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ValidationError::InvalidRetryPolicy(
                "max_delay_ms must not be below initial_delay_ms",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RetryConfig::default();
        assert_eq!(config.initial_delay_ms, 1000);
        assert_eq!(config.max_delay_ms, 30_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_multiplier_of_one_rejected() {
        let config = RetryConfig {
            multiplier: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
