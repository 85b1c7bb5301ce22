//! WebhookIngress - entry point for raw Stripe deliveries.
//!
//! A delivery moves through these stages:
//! received -> signature verified -> classified -> dispatched -> acked.
//!
//! Any failure before `Acked` is returned to the caller, which answers Stripe
//! with `WebhookError::status_code()`. Stripe redelivers on 5xx.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::config::AppConfig;
use crate::domain::billing::{IdempotentWebhookProcessor, WebhookDispatcher, WebhookError};
use crate::ports::{BillingGateway, WebhookEventRepository, WebhookResult};

/// Lifecycle of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngressStage {
    Received,
    SignatureVerified,
    Classified,
    Dispatched,
    Acked,
}

impl fmt::Display for IngressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            IngressStage::Received => "received",
            IngressStage::SignatureVerified => "signature_verified",
            IngressStage::Classified => "classified",
            IngressStage::Dispatched => "dispatched",
            IngressStage::Acked => "acked",
        };
        f.write_str(stage)
    }
}

/// Acknowledgement for a delivery that reached `Acked`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookAck {
    pub event_id: String,
    pub event_type: String,
    pub result: WebhookResult,
}

pub struct WebhookIngress<R: WebhookEventRepository, D: WebhookDispatcher> {
    processor: IdempotentWebhookProcessor<R, D>,
    billing: Arc<dyn BillingGateway>,
    secret: SecretString,
    timeout: Duration,
}

impl<R: WebhookEventRepository, D: WebhookDispatcher> WebhookIngress<R, D> {
    pub fn new(
        processor: IdempotentWebhookProcessor<R, D>,
        billing: Arc<dyn BillingGateway>,
        secret: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            processor,
            billing,
            secret: SecretString::new(secret.into()),
            timeout,
        }
    }

    /// Builds an ingress from configuration. `None` without a signing secret.
    pub fn from_config(
        processor: IdempotentWebhookProcessor<R, D>,
        billing: Arc<dyn BillingGateway>,
        config: &AppConfig,
    ) -> Option<Self> {
        let secret = config.webhook_secret()?.to_string();
        Some(Self::new(processor, billing, secret, config.webhook.handler_timeout()))
    }

    pub fn processor(&self) -> &IdempotentWebhookProcessor<R, D> {
        &self.processor
    }

    /// Verifies, classifies and dispatches one delivery.
    pub async fn receive(&self, payload: &[u8], signature: &str) -> Result<WebhookAck, WebhookError> {
        tracing::debug!(stage = %IngressStage::Received, bytes = payload.len(), "webhook delivery");

        // 1. Verify the signature and parse the envelope
        let event = self
            .billing
            .parse_webhook_payload(payload, signature, self.secret.expose_secret())
            .map_err(|err| {
                tracing::warn!(error = %err, "webhook signature rejected");
                err
            })?;
        tracing::debug!(stage = %IngressStage::SignatureVerified, event_id = %event.id, "webhook delivery");

        // 2. Classify by type
        let classified = event.classify()?;
        tracing::debug!(
            stage = %IngressStage::Classified,
            event_id = %event.id,
            kind = classified.kind(),
            "webhook delivery"
        );

        // 3. Dispatch within the delivery budget
        let result = tokio::time::timeout(self.timeout, self.processor.process(&event, classified))
            .await
            .map_err(|_| WebhookError::Timeout(self.timeout.as_secs()))
            .and_then(|result| result)
            .map_err(|err| {
                tracing::error!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    error = %err,
                    retryable = err.is_retryable(),
                    "webhook handler failed"
                );
                err
            })?;
        tracing::debug!(stage = %IngressStage::Dispatched, event_id = %event.id, "webhook delivery");

        tracing::info!(
            stage = %IngressStage::Acked,
            event_id = %event.id,
            event_type = %event.event_type,
            result = ?result,
            "webhook delivery"
        );
        Ok(WebhookAck {
            event_id: event.id,
            event_type: event.event_type,
            result,
        })
    }
}
