//! Application configuration module
//!
//! Configuration is read from environment variables using the `config` and
//! `dotenvy` crates, with the `MEMBERS_BILLING` prefix and `__` between
//! nested keys.
//!
//! # Example
//!
//! ```no_run
//! use members_billing::config::{init_tracing, AppConfig};
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! init_tracing(&config.logging);
//! ```

mod error;
mod logging;
mod payment;
mod retry;
mod webhook;

pub use error::{ConfigError, ValidationError};
pub use logging::{init_tracing, LoggingConfig};
pub use payment::PaymentConfig;
pub use retry::RetryConfig;
pub use webhook::WebhookConfig;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Stripe credentials and billing defaults
    pub payment: PaymentConfig,

    /// Webhook endpoint and handler settings
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Backoff for Stripe API calls
    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// - `MEMBERS_BILLING__PAYMENT__STRIPE_API_KEY=sk_test_...` -> `payment.stripe_api_key`
    /// - `MEMBERS_BILLING__RETRY__MAX_NETWORK_RETRIES=3` -> `retry.max_network_retries`
    ///
    /// A `.env` file is loaded first when present.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("MEMBERS_BILLING")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.payment.validate()?;
        self.webhook.validate()?;
        self.retry.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Signing secret for incoming webhooks: the static one if configured,
    /// otherwise the managed endpoint's.
    pub fn webhook_secret(&self) -> Option<&str> {
        self.payment
            .stripe_webhook_secret
            .as_deref()
            .or(self.webhook.endpoint_secret.as_deref())
    }
}
