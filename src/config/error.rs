//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid Stripe API key format")]
    InvalidStripeKey,

    #[error("Invalid Stripe webhook secret format")]
    InvalidStripeWebhookSecret,

    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    #[error("Invalid plan interval: {0}")]
    InvalidInterval(String),

    #[error("Invalid webhook handler URL")]
    InvalidHandlerUrl,

    #[error("Invalid handler timeout")]
    InvalidTimeout,

    #[error("Invalid retry policy: {0}")]
    InvalidRetryPolicy(&'static str),

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),
}
