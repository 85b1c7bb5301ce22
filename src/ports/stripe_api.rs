//! StripeApi port - raw resource CRUD against the Stripe REST API.
//!
//! The billing gateway layers retry, idempotency and typing on top of this
//! capability; adapters only move form-encoded requests and JSON responses.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::domain::billing::BillingError;

/// Stripe API resources used by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StripeResource {
    Customers,
    Subscriptions,
    Products,
    Prices,
    PaymentMethods,
    SetupIntents,
    WebhookEndpoints,
}

impl StripeResource {
    /// Collection path under `/v1/`.
    pub fn path(&self) -> &'static str {
        match self {
            StripeResource::Customers => "customers",
            StripeResource::Subscriptions => "subscriptions",
            StripeResource::Products => "products",
            StripeResource::Prices => "prices",
            StripeResource::PaymentMethods => "payment_methods",
            StripeResource::SetupIntents => "setup_intents",
            StripeResource::WebhookEndpoints => "webhook_endpoints",
        }
    }
}

/// Form-encoded request body in Stripe's bracket notation
/// (`items[0][price]=price_123`).
pub type FormParams = Vec<(String, String)>;

#[async_trait]
pub trait StripeApi: Send + Sync {
    async fn retrieve(
        &self,
        resource: StripeResource,
        id: &str,
        expand: &[&str],
    ) -> Result<JsonValue, BillingError>;

    /// Creates a resource. Every attempt of one logical create must carry
    /// the same `idempotency_key` so a resent request is not applied twice.
    async fn create(
        &self,
        resource: StripeResource,
        params: FormParams,
        idempotency_key: &str,
    ) -> Result<JsonValue, BillingError>;

    async fn update(
        &self,
        resource: StripeResource,
        id: &str,
        params: FormParams,
    ) -> Result<JsonValue, BillingError>;

    async fn delete(&self, resource: StripeResource, id: &str) -> Result<JsonValue, BillingError>;

    /// POSTs to a resource action such as `payment_methods/{id}/attach`.
    async fn invoke(
        &self,
        resource: StripeResource,
        id: &str,
        action: &str,
        params: FormParams,
    ) -> Result<JsonValue, BillingError>;
}
