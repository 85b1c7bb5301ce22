//! Logging configuration and subscriber initialisation

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use super::error::ValidationError;

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if LEVELS.contains(&self.level.to_lowercase().as_str()) {
            Ok(())
        } else {
            Err(ValidationError::InvalidLogLevel(self.level.clone()))
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("members_billing={}", self.level)))
    }
}

/// Installs the global tracing subscriber.
///
/// Returns false when a subscriber was already installed.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.filter())
        .with_target(true);

    if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}
