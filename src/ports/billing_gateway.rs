//! BillingGateway port - typed Stripe capabilities used by the membership core.
//!
//! # Design
//!
//! - **Retry-transparent**: rate limits and network blips are retried inside
//!   the adapter; callers see only the final outcome
//! - **Idempotent creation**: products, prices and customers are created
//!   under deterministic ids, so re-running a creation never duplicates
//! - **Fail closed**: webhook payloads are verified before they are parsed

use async_trait::async_trait;

use crate::domain::billing::{
    BillingError, StripeCustomerObject, StripeEvent, StripePaymentMethod, StripePrice,
    StripeProduct, StripeSetupIntent, StripeSubscription, StripeWebhookEndpoint, StripeWebhookVerifier,
    WebhookError,
};
use crate::domain::member::PlanInterval;

/// Semantic identity of a recurring price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSpec {
    pub product_id: String,
    pub interval: PlanInterval,
    pub currency: String,
    pub amount: i64,
    pub nickname: Option<String>,
}

impl PriceSpec {
    /// Seed for the price's deterministic id.
    pub fn seed(&self) -> String {
        format!(
            "{}{}{}{}",
            self.product_id,
            self.interval,
            self.currency.to_lowercase(),
            self.amount
        )
    }
}

#[async_trait]
pub trait BillingGateway: Send + Sync {
    /// Retrieves a customer with its subscriptions expanded.
    async fn get_customer(&self, customer_id: &str) -> Result<StripeCustomerObject, BillingError>;

    /// Creates (or reuses) the customer deterministically keyed by `email`.
    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<StripeCustomerObject, BillingError>;

    async fn update_customer_email(
        &self,
        customer_id: &str,
        email: &str,
    ) -> Result<StripeCustomerObject, BillingError>;

    /// Retrieves a subscription with its default payment method expanded.
    async fn get_subscription(&self, subscription_id: &str)
        -> Result<StripeSubscription, BillingError>;

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
    ) -> Result<StripeSubscription, BillingError>;

    /// Cancels immediately.
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, BillingError>;

    /// Schedules (or unschedules) cancellation at period end, recording
    /// `reason` in the subscription metadata.
    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel: bool,
        reason: Option<&str>,
    ) -> Result<StripeSubscription, BillingError>;

    /// Swaps the subscription's single line item to `price_id`.
    async fn change_plan(
        &self,
        subscription_id: &str,
        price_id: &str,
    ) -> Result<StripeSubscription, BillingError>;

    async fn update_default_payment_method(
        &self,
        subscription_id: &str,
        payment_method_id: &str,
    ) -> Result<StripeSubscription, BillingError>;

    async fn get_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<StripePaymentMethod, BillingError>;

    async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> Result<StripePaymentMethod, BillingError>;

    async fn get_setup_intent(&self, setup_intent_id: &str)
        -> Result<StripeSetupIntent, BillingError>;

    /// Gets or creates the product deterministically keyed by `name`.
    async fn ensure_product(&self, name: &str) -> Result<StripeProduct, BillingError>;

    /// Gets or creates the price deterministically keyed by `spec.seed()`.
    async fn ensure_price(&self, spec: &PriceSpec) -> Result<StripePrice, BillingError>;

    async fn create_webhook_endpoint(
        &self,
        url: &str,
        enabled_events: &[&str],
    ) -> Result<StripeWebhookEndpoint, BillingError>;

    async fn update_webhook_endpoint(
        &self,
        endpoint_id: &str,
        url: &str,
        enabled_events: &[&str],
    ) -> Result<StripeWebhookEndpoint, BillingError>;

    async fn delete_webhook_endpoint(&self, endpoint_id: &str) -> Result<(), BillingError>;

    /// Verifies `signature` over the raw `payload` and parses the event.
    fn parse_webhook_payload(
        &self,
        payload: &[u8],
        signature: &str,
        secret: &str,
    ) -> Result<StripeEvent, WebhookError> {
        StripeWebhookVerifier::new(secret).verify_and_parse(payload, signature)
    }
}
