//! Management of the Stripe webhook endpoint that delivers to this service.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::domain::billing::{BillingErrorKind, StripeEventType};
use crate::domain::member::MemberError;
use crate::ports::BillingGateway;

/// Endpoint id and signing secret to persist for the next start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRegistration {
    /// `None` when deliveries are forwarded with a fixed secret.
    pub endpoint_id: Option<String>,
    pub secret: String,
}

pub struct WebhookEndpointManager {
    billing: Arc<dyn BillingGateway>,
}

impl WebhookEndpointManager {
    pub fn new(billing: Arc<dyn BillingGateway>) -> Self {
        Self { billing }
    }

    /// Event types the endpoint subscribes to.
    pub fn enabled_events() -> Vec<&'static str> {
        StripeEventType::HANDLED.iter().map(|t| t.as_str()).collect()
    }

    /// Ensures an endpoint delivers to the configured handler url.
    ///
    /// A static signing secret skips endpoint management. A stored endpoint
    /// is updated in place; when that fails it is replaced by a new one,
    /// which rotates the signing secret.
    pub async fn configure(&self, app: &AppConfig) -> Result<WebhookRegistration, MemberError> {
        if let Some(secret) = &app.payment.stripe_webhook_secret {
            return Ok(WebhookRegistration {
                endpoint_id: None,
                secret: secret.clone(),
            });
        }
        let config = &app.webhook;
        let Some(url) = config.handler_url.as_deref() else {
            return Err(MemberError::NotConfigured(
                "webhook handler url is not set".to_string(),
            ));
        };
        let events = Self::enabled_events();

        let (Some(endpoint_id), Some(secret)) = (&config.endpoint_id, &config.endpoint_secret) else {
            return self.create(url, &events).await;
        };

        match self
            .billing
            .update_webhook_endpoint(endpoint_id, url, &events)
            .await
        {
            Ok(endpoint) => {
                tracing::info!(endpoint_id = %endpoint.id, url = %url, "Webhook endpoint updated");
                Ok(WebhookRegistration {
                    endpoint_id: Some(endpoint.id),
                    secret: secret.clone(),
                })
            }
            Err(err) => {
                tracing::warn!(endpoint_id = %endpoint_id, error = %err, "Webhook endpoint update failed, recreating");
                if !err.is(BillingErrorKind::ResourceMissing) {
                    self.remove(endpoint_id).await;
                }
                self.create(url, &events).await
            }
        }
    }

    /// Deletes an endpoint. Returns whether the provider confirmed it.
    pub async fn remove(&self, endpoint_id: &str) -> bool {
        match self.billing.delete_webhook_endpoint(endpoint_id).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(endpoint_id = %endpoint_id, error = %err, "Failed to delete webhook endpoint");
                false
            }
        }
    }

    async fn create(&self, url: &str, events: &[&str]) -> Result<WebhookRegistration, MemberError> {
        let endpoint = self.billing.create_webhook_endpoint(url, events).await?;
        let secret = endpoint.secret.ok_or_else(|| {
            MemberError::NotConfigured(format!("endpoint {} was created without a secret", endpoint.id))
        })?;
        tracing::info!(endpoint_id = %endpoint.id, url = %url, "Webhook endpoint created");
        Ok(WebhookRegistration {
            endpoint_id: Some(endpoint.id),
            secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::stripe::MockBillingGateway;
    use crate::config::{LoggingConfig, PaymentConfig, RetryConfig, WebhookConfig};
    use crate::domain::billing::{BillingError, StripeWebhookEndpoint};

    const URL: &str = "https://members.example.com/webhooks/stripe";

    fn app(payment: PaymentConfig, webhook: WebhookConfig) -> AppConfig {
        AppConfig {
            payment,
            webhook,
            retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    fn config(endpoint_id: Option<&str>, secret: Option<&str>) -> AppConfig {
        app(
            PaymentConfig::default(),
            WebhookConfig {
                handler_url: Some(URL.to_string()),
                endpoint_id: endpoint_id.map(str::to_string),
                endpoint_secret: secret.map(str::to_string),
                ..Default::default()
            },
        )
    }

    fn existing(mock: &MockBillingGateway) {
        mock.add_webhook_endpoint(StripeWebhookEndpoint {
            id: "we_1".into(),
            secret: None,
            url: "https://old.example.com/hook".into(),
            enabled_events: vec![],
        });
    }

    #[tokio::test]
    async fn first_configure_creates_endpoint() {
        let mock = MockBillingGateway::new();
        let manager = WebhookEndpointManager::new(Arc::new(mock.clone()));

        let registration = manager.configure(&config(None, None)).await.unwrap();

        assert!(registration.endpoint_id.is_some());
        assert!(registration.secret.starts_with("whsec_"));
        let endpoints = mock.webhook_endpoints();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].url, URL);
        assert_eq!(endpoints[0].enabled_events.len(), 5);
    }

    #[tokio::test]
    async fn stored_endpoint_is_updated_and_keeps_secret() {
        let mock = MockBillingGateway::new();
        existing(&mock);
        let manager = WebhookEndpointManager::new(Arc::new(mock.clone()));

        let registration = manager
            .configure(&config(Some("we_1"), Some("whsec_kept")))
            .await
            .unwrap();

        assert_eq!(registration.endpoint_id.as_deref(), Some("we_1"));
        assert_eq!(registration.secret, "whsec_kept");
        assert!(!mock.was_called("create_webhook_endpoint"));
    }

    #[tokio::test]
    async fn missing_endpoint_is_recreated_without_delete() {
        let mock = MockBillingGateway::new();
        let manager = WebhookEndpointManager::new(Arc::new(mock.clone()));

        let registration = manager
            .configure(&config(Some("we_gone"), Some("whsec_old")))
            .await
            .unwrap();

        assert_ne!(registration.endpoint_id.as_deref(), Some("we_gone"));
        assert_ne!(registration.secret, "whsec_old");
        assert!(!mock.was_called("delete_webhook_endpoint"));
    }

    #[tokio::test]
    async fn failed_update_deletes_before_recreate() {
        let mock = MockBillingGateway::new();
        existing(&mock);
        mock.fail_next(
            "update_webhook_endpoint",
            BillingError::new(BillingErrorKind::InvalidRequest, "url not allowed"),
        );
        let manager = WebhookEndpointManager::new(Arc::new(mock.clone()));

        manager
            .configure(&config(Some("we_1"), Some("whsec_old")))
            .await
            .unwrap();

        assert!(mock.was_called("delete_webhook_endpoint"));
        let endpoints = mock.webhook_endpoints();
        assert_eq!(endpoints.len(), 1);
        assert_ne!(endpoints[0].id, "we_1");
    }

    #[tokio::test]
    async fn static_secret_skips_endpoint_management() {
        let mock = MockBillingGateway::new();
        let manager = WebhookEndpointManager::new(Arc::new(mock.clone()));
        let payment = PaymentConfig {
            stripe_webhook_secret: Some("whsec_cli".into()),
            ..Default::default()
        };

        let registration = manager
            .configure(&app(payment, WebhookConfig::default()))
            .await
            .unwrap();

        assert_eq!(registration.endpoint_id, None);
        assert_eq!(registration.secret, "whsec_cli");
        assert!(!mock.was_called("create_webhook_endpoint"));
    }

    #[tokio::test]
    async fn missing_url_is_not_configured() {
        let manager = WebhookEndpointManager::new(Arc::new(MockBillingGateway::new()));

        let result = manager
            .configure(&app(PaymentConfig::default(), WebhookConfig::default()))
            .await;

        assert!(matches!(result, Err(MemberError::NotConfigured(_))));
    }
}
