//! Webhook endpoint configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Where Stripe delivers events and how long a handler may run.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Public URL of the webhook handler
    pub handler_url: Option<String>,

    /// Id of the managed endpoint, persisted from a previous configure
    pub endpoint_id: Option<String>,

    /// Signing secret of the managed endpoint
    pub endpoint_secret: Option<String>,

    /// Handler budget, kept below Stripe's delivery timeout
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,
}

fn default_handler_timeout_secs() -> u64 {
    25
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            handler_url: None,
            endpoint_id: None,
            endpoint_secret: None,
            handler_timeout_secs: default_handler_timeout_secs(),
        }
    }
}

impl WebhookConfig {
    pub fn handler_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.handler_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.handler_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        if let Some(url) = &self.handler_url {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(ValidationError::InvalidHandlerUrl);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeout() {
        let config = WebhookConfig::default();
        assert_eq!(config.handler_timeout().as_secs(), 25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = WebhookConfig {
            handler_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidTimeout));
    }

    #[test]
    fn test_handler_url_must_be_http() {
        let config = WebhookConfig {
            handler_url: Some("ftp://members.example.com/webhooks".to_string()),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidHandlerUrl));
    }
}
