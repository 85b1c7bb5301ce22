//! Payment configuration

use secrecy::SecretString;
use serde::Deserialize;

use crate::domain::member::PlanInterval;

use super::error::ValidationError;

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe API key
    #[serde(default)]
    pub stripe_api_key: String,

    /// Static webhook signing secret. When set, endpoint management is skipped.
    pub stripe_webhook_secret: Option<String>,

    /// Base URL for the Stripe API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Currency for complimentary subscriptions when the member has none
    #[serde(default = "default_currency")]
    pub default_currency: String,

    /// Billing interval of complimentary prices
    #[serde(default = "default_complimentary_interval")]
    pub complimentary_price_interval: String,
}

fn default_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_complimentary_interval() -> String {
    "year".to_string()
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_api_key: String::new(),
            stripe_webhook_secret: None,
            api_base_url: default_api_base_url(),
            default_currency: default_currency(),
            complimentary_price_interval: default_complimentary_interval(),
        }
    }
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    /// Check if using Stripe live mode
    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_live_")
    }

    /// API key wrapped for handing to adapters.
    pub fn api_key(&self) -> SecretString {
        SecretString::new(self.stripe_api_key.clone())
    }

    pub fn complimentary_interval(&self) -> Result<PlanInterval, ValidationError> {
        self.complimentary_price_interval
            .parse()
            .map_err(|_| ValidationError::InvalidInterval(self.complimentary_price_interval.clone()))
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_api_key.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_API_KEY"));
        }
        if !self.stripe_api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if let Some(secret) = &self.stripe_webhook_secret {
            if !secret.starts_with("whsec_") {
                return Err(ValidationError::InvalidStripeWebhookSecret);
            }
        }

        let currency = &self.default_currency;
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCurrency(currency.clone()));
        }

        self.complimentary_interval()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> PaymentConfig {
        PaymentConfig {
            stripe_api_key: "sk_test_abcd1234".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_is_test_mode() {
        let config = valid();
        assert!(config.is_test_mode());
        assert!(!config.is_live_mode());
    }

    #[test]
    fn test_validation_missing_api_key() {
        let config = PaymentConfig::default();
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("STRIPE_API_KEY"))
        );
    }

    #[test]
    fn test_validation_invalid_api_key_prefix() {
        let config = PaymentConfig {
            stripe_api_key: "pk_test_xxx".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidStripeKey));
    }

    #[test]
    fn test_webhook_secret_is_optional_but_checked() {
        assert!(valid().validate().is_ok());

        let config = PaymentConfig {
            stripe_webhook_secret: Some("secret_xxx".to_string()),
            ..valid()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidStripeWebhookSecret)
        );
    }

    #[test]
    fn test_defaults() {
        let config = valid();
        assert_eq!(config.default_currency, "usd");
        assert_eq!(config.complimentary_interval(), Ok(PlanInterval::Year));
        assert_eq!(config.api_base_url, "https://api.stripe.com");
    }

    #[test]
    fn test_invalid_currency_and_interval() {
        let config = PaymentConfig {
            default_currency: "dollars".to_string(),
            ..valid()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidCurrency(_))
        ));

        let config = PaymentConfig {
            complimentary_price_interval: "fortnight".to_string(),
            ..valid()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidInterval(_))
        ));
    }
}
