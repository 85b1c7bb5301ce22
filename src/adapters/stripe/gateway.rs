//! Stripe billing gateway.
//!
//! Implements `BillingGateway` on top of a raw `StripeApi`: every call runs
//! under the retry policy, responses are decoded into the typed Stripe
//! shapes, and products, prices and customers go through deterministic ids.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::config::{PaymentConfig, RetryConfig};
use crate::domain::billing::{
    BillingError, BillingErrorKind, StripeCustomerObject, StripePaymentMethod, StripePrice,
    StripeProduct, StripeSetupIntent, StripeSubscription, StripeWebhookEndpoint,
};
use crate::ports::{BillingGateway, FormParams, PriceSpec, StripeApi, StripeResource};

use super::deterministic::{active, not_deleted, DeterministicResource};
use super::http_api::{StripeHttpApi, StripeHttpConfig};
use super::retry::RetryPolicy;

const SUBSCRIPTION_EXPAND: &[&str] = &["default_payment_method"];
const CUSTOMER_EXPAND: &[&str] = &["subscriptions", "subscriptions.data.default_payment_method"];

pub struct StripeBillingGateway<A: StripeApi> {
    api: A,
    retry: RetryPolicy,
}

impl StripeBillingGateway<StripeHttpApi> {
    /// Gateway over the live Stripe API.
    pub fn from_config(payment: &PaymentConfig, retry: &RetryConfig) -> Self {
        let http = StripeHttpConfig::new(payment.api_key()).with_base_url(&payment.api_base_url);
        Self::new(StripeHttpApi::new(http), RetryPolicy::from_config(retry))
    }
}

impl<A: StripeApi> StripeBillingGateway<A> {
    pub fn new(api: A, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }

    fn products(&self) -> DeterministicResource<'_, A> {
        DeterministicResource::new(&self.api, &self.retry, StripeResource::Products, active)
    }

    fn prices(&self) -> DeterministicResource<'_, A> {
        DeterministicResource::new(&self.api, &self.retry, StripeResource::Prices, active)
    }

    fn customers(&self) -> DeterministicResource<'_, A> {
        DeterministicResource::new(&self.api, &self.retry, StripeResource::Customers, not_deleted)
    }

    async fn retrieve<T: DeserializeOwned>(
        &self,
        resource: StripeResource,
        id: &str,
        expand: &[&str],
    ) -> Result<T, BillingError> {
        let value = self
            .retry
            .run("retrieve", || self.api.retrieve(resource, id, expand))
            .await?;
        decode(resource, value)
    }

    /// Creates a resource with a key fixed before the first attempt, so a
    /// retry after a lost response returns the original object.
    async fn create<T: DeserializeOwned>(
        &self,
        resource: StripeResource,
        params: FormParams,
    ) -> Result<T, BillingError> {
        let idempotency_key = Uuid::new_v4().to_string();
        let value = self
            .retry
            .run("create", || {
                self.api.create(resource, params.clone(), &idempotency_key)
            })
            .await?;
        decode(resource, value)
    }

    async fn update<T: DeserializeOwned>(
        &self,
        resource: StripeResource,
        id: &str,
        params: FormParams,
    ) -> Result<T, BillingError> {
        let value = self
            .retry
            .run("update", || self.api.update(resource, id, params.clone()))
            .await?;
        decode(resource, value)
    }
}

fn decode<T: DeserializeOwned>(resource: StripeResource, value: JsonValue) -> Result<T, BillingError> {
    serde_json::from_value(value).map_err(|e| {
        BillingError::new(
            BillingErrorKind::Provider,
            format!("Unexpected {} response: {}", resource.path(), e),
        )
    })
}

fn params<const N: usize>(pairs: [(&str, &str); N]) -> FormParams {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn expanded(mut form: FormParams, fields: &[&str]) -> FormParams {
    form.extend(fields.iter().map(|f| ("expand[]".to_string(), f.to_string())));
    form
}

#[async_trait]
impl<A: StripeApi> BillingGateway for StripeBillingGateway<A> {
    async fn get_customer(&self, customer_id: &str) -> Result<StripeCustomerObject, BillingError> {
        self.retrieve(StripeResource::Customers, customer_id, CUSTOMER_EXPAND)
            .await
    }

    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<StripeCustomerObject, BillingError> {
        let mut form = params([("email", email)]);
        if let Some(name) = name {
            form.push(("name".to_string(), name.to_string()));
        }
        let value = self.customers().ensure(email, form).await?;
        decode(StripeResource::Customers, value)
    }

    async fn update_customer_email(
        &self,
        customer_id: &str,
        email: &str,
    ) -> Result<StripeCustomerObject, BillingError> {
        self.update(StripeResource::Customers, customer_id, params([("email", email)]))
            .await
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, BillingError> {
        self.retrieve(StripeResource::Subscriptions, subscription_id, SUBSCRIPTION_EXPAND)
            .await
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
    ) -> Result<StripeSubscription, BillingError> {
        let form = params([("customer", customer_id), ("items[0][price]", price_id)]);
        self.create(StripeResource::Subscriptions, expanded(form, SUBSCRIPTION_EXPAND))
            .await
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, BillingError> {
        let value = self
            .retry
            .run("delete", || {
                self.api.delete(StripeResource::Subscriptions, subscription_id)
            })
            .await?;
        decode(StripeResource::Subscriptions, value)
    }

    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel: bool,
        reason: Option<&str>,
    ) -> Result<StripeSubscription, BillingError> {
        // An empty metadata value unsets the key.
        let reason = if cancel { reason.unwrap_or("") } else { "" };
        let form = params([
            ("cancel_at_period_end", if cancel { "true" } else { "false" }),
            ("metadata[cancellation_reason]", reason),
        ]);
        self.update(
            StripeResource::Subscriptions,
            subscription_id,
            expanded(form, SUBSCRIPTION_EXPAND),
        )
        .await
    }

    async fn change_plan(
        &self,
        subscription_id: &str,
        price_id: &str,
    ) -> Result<StripeSubscription, BillingError> {
        let current = self.get_subscription(subscription_id).await?;
        let item = current.items.data.first().ok_or_else(|| {
            BillingError::new(
                BillingErrorKind::InvalidRequest,
                format!("subscription {} has no line items", subscription_id),
            )
        })?;

        let form = params([
            ("items[0][id]", item.id.as_str()),
            ("items[0][price]", price_id),
            ("cancel_at_period_end", "false"),
            ("proration_behavior", "always_invoice"),
        ]);
        self.update(
            StripeResource::Subscriptions,
            subscription_id,
            expanded(form, SUBSCRIPTION_EXPAND),
        )
        .await
    }

    async fn update_default_payment_method(
        &self,
        subscription_id: &str,
        payment_method_id: &str,
    ) -> Result<StripeSubscription, BillingError> {
        let form = params([("default_payment_method", payment_method_id)]);
        self.update(
            StripeResource::Subscriptions,
            subscription_id,
            expanded(form, SUBSCRIPTION_EXPAND),
        )
        .await
    }

    async fn get_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<StripePaymentMethod, BillingError> {
        self.retrieve(StripeResource::PaymentMethods, payment_method_id, &[])
            .await
    }

    async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> Result<StripePaymentMethod, BillingError> {
        let value = self
            .retry
            .run("attach", || {
                self.api.invoke(
                    StripeResource::PaymentMethods,
                    payment_method_id,
                    "attach",
                    params([("customer", customer_id)]),
                )
            })
            .await?;
        decode(StripeResource::PaymentMethods, value)
    }

    async fn get_setup_intent(
        &self,
        setup_intent_id: &str,
    ) -> Result<StripeSetupIntent, BillingError> {
        self.retrieve(StripeResource::SetupIntents, setup_intent_id, &[])
            .await
    }

    async fn ensure_product(&self, name: &str) -> Result<StripeProduct, BillingError> {
        let value = self.products().ensure(name, params([("name", name)])).await?;
        decode(StripeResource::Products, value)
    }

    async fn ensure_price(&self, spec: &PriceSpec) -> Result<StripePrice, BillingError> {
        let amount = spec.amount.to_string();
        let currency = spec.currency.to_lowercase();
        let mut form = params([
            ("product", spec.product_id.as_str()),
            ("currency", currency.as_str()),
            ("unit_amount", amount.as_str()),
            ("recurring[interval]", spec.interval.as_str()),
        ]);
        if let Some(nickname) = &spec.nickname {
            form.push(("nickname".to_string(), nickname.clone()));
        }
        let value = self.prices().ensure(&spec.seed(), form).await?;
        decode(StripeResource::Prices, value)
    }

    async fn create_webhook_endpoint(
        &self,
        url: &str,
        enabled_events: &[&str],
    ) -> Result<StripeWebhookEndpoint, BillingError> {
        let mut form = params([("url", url)]);
        form.extend(
            enabled_events
                .iter()
                .map(|event| ("enabled_events[]".to_string(), event.to_string())),
        );
        self.create(StripeResource::WebhookEndpoints, form).await
    }

    async fn update_webhook_endpoint(
        &self,
        endpoint_id: &str,
        url: &str,
        enabled_events: &[&str],
    ) -> Result<StripeWebhookEndpoint, BillingError> {
        let mut form = params([("url", url)]);
        form.extend(
            enabled_events
                .iter()
                .map(|event| ("enabled_events[]".to_string(), event.to_string())),
        );
        self.update(StripeResource::WebhookEndpoints, endpoint_id, form)
            .await
    }

    async fn delete_webhook_endpoint(&self, endpoint_id: &str) -> Result<(), BillingError> {
        self.retry
            .run("delete", || {
                self.api.delete(StripeResource::WebhookEndpoints, endpoint_id)
            })
            .await
            .map(|_| ())
    }
}
