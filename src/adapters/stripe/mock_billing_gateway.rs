//! Mock billing gateway for testing.
//!
//! An in-memory stand-in for Stripe that keeps customers, subscriptions,
//! prices and webhook endpoints consistent with each other. Supports:
//! - Seeded objects
//! - Per-method error injection
//! - Call tracking

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::billing::{
    BillingError, PaymentMethodRef, Recurring, StripeCustomerObject, StripeList,
    StripePaymentMethod, StripePrice, StripeProduct, StripeSetupIntent, StripeSubscription,
    StripeWebhookEndpoint, SubscriptionItem,
};
use crate::domain::foundation::Timestamp;
use crate::domain::member::{PlanInterval, SubscriptionStatus};
use crate::ports::{BillingGateway, PriceSpec};

const PERIOD_SECS: i64 = 30 * 24 * 60 * 60;

/// Recorded method call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: &'static str,
    pub args: Vec<String>,
}

#[derive(Default)]
struct MockState {
    customers: HashMap<String, StripeCustomerObject>,
    subscriptions: HashMap<String, StripeSubscription>,
    payment_methods: HashMap<String, StripePaymentMethod>,
    setup_intents: HashMap<String, StripeSetupIntent>,
    products: HashMap<String, StripeProduct>,
    prices: HashMap<String, StripePrice>,
    endpoints: HashMap<String, StripeWebhookEndpoint>,
    /// Errors returned by the next calls of a method, in order.
    failures: HashMap<&'static str, VecDeque<BillingError>>,
    call_log: Vec<MethodCall>,
    sequence: u64,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.sequence += 1;
        format!("{}_mock_{}", prefix, self.sequence)
    }

    fn record(&mut self, method: &'static str, args: &[&str]) -> Result<(), BillingError> {
        self.call_log.push(MethodCall {
            method,
            args: args.iter().map(|a| a.to_string()).collect(),
        });
        match self.failures.get_mut(method).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn subscription_mut(&mut self, id: &str) -> Result<&mut StripeSubscription, BillingError> {
        self.subscriptions
            .get_mut(id)
            .ok_or_else(|| BillingError::missing(id))
    }

    fn price(&self, id: &str) -> Result<StripePrice, BillingError> {
        self.prices.get(id).cloned().ok_or_else(|| BillingError::missing(id))
    }
}

/// In-memory `BillingGateway`.
///
/// # Example
///
/// ```ignore
/// let billing = MockBillingGateway::new();
/// billing.add_price(recurring_price("price_monthly", 500, "usd", PlanInterval::Month));
/// billing.fail_next("cancel_subscription", BillingError::missing("sub_1"));
/// ```
#[derive(Clone, Default)]
pub struct MockBillingGateway {
    inner: Arc<Mutex<MockState>>,
}

impl MockBillingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    pub fn add_customer(&self, customer: StripeCustomerObject) {
        self.state().customers.insert(customer.id.clone(), customer);
    }

    /// Adds a subscription, creating a bare customer for it if needed.
    pub fn add_subscription(&self, subscription: StripeSubscription) {
        let mut state = self.state();
        state
            .customers
            .entry(subscription.customer.clone())
            .or_insert_with(|| StripeCustomerObject {
                id: subscription.customer.clone(),
                email: None,
                name: None,
                deleted: false,
                subscriptions: None,
            });
        for item in &subscription.items.data {
            if let Some(price) = &item.price {
                state.prices.entry(price.id.clone()).or_insert_with(|| price.clone());
            }
        }
        state.subscriptions.insert(subscription.id.clone(), subscription);
    }

    pub fn add_price(&self, price: StripePrice) {
        self.state().prices.insert(price.id.clone(), price);
    }

    pub fn add_payment_method(&self, method: StripePaymentMethod) {
        self.state().payment_methods.insert(method.id.clone(), method);
    }

    pub fn add_setup_intent(&self, intent: StripeSetupIntent) {
        self.state().setup_intents.insert(intent.id.clone(), intent);
    }

    pub fn add_webhook_endpoint(&self, endpoint: StripeWebhookEndpoint) {
        self.state().endpoints.insert(endpoint.id.clone(), endpoint);
    }

    /// Queues an error for the next call of `method`.
    pub fn fail_next(&self, method: &'static str, error: BillingError) {
        self.state()
            .failures
            .entry(method)
            .or_default()
            .push_back(error);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Inspection Methods
    // ════════════════════════════════════════════════════════════════════════════

    pub fn subscription(&self, id: &str) -> Option<StripeSubscription> {
        self.state().subscriptions.get(id).cloned()
    }

    pub fn customer(&self, id: &str) -> Option<StripeCustomerObject> {
        self.state().customers.get(id).cloned()
    }

    pub fn prices(&self) -> Vec<StripePrice> {
        self.state().prices.values().cloned().collect()
    }

    pub fn webhook_endpoints(&self) -> Vec<StripeWebhookEndpoint> {
        self.state().endpoints.values().cloned().collect()
    }

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.call_count(method) > 0
    }

    pub fn clear_calls(&self) {
        self.state().call_log.clear();
    }
}

#[async_trait]
impl BillingGateway for MockBillingGateway {
    async fn get_customer(&self, customer_id: &str) -> Result<StripeCustomerObject, BillingError> {
        let mut state = self.state();
        state.record("get_customer", &[customer_id])?;
        let mut customer = state
            .customers
            .get(customer_id)
            .cloned()
            .ok_or_else(|| BillingError::missing(customer_id))?;
        let mut subscriptions: Vec<StripeSubscription> = state
            .subscriptions
            .values()
            .filter(|s| s.customer == customer_id)
            .cloned()
            .collect();
        subscriptions.sort_by(|a, b| a.id.cmp(&b.id));
        customer.subscriptions = Some(StripeList::of(subscriptions));
        Ok(customer)
    }

    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<StripeCustomerObject, BillingError> {
        let mut state = self.state();
        state.record("create_customer", &[email])?;
        let existing = state
            .customers
            .values()
            .find(|c| !c.deleted && c.email.as_deref() == Some(email))
            .cloned();
        if let Some(customer) = existing {
            return Ok(customer);
        }
        let customer = StripeCustomerObject {
            id: state.next_id("cus"),
            email: Some(email.to_string()),
            name: name.map(str::to_string),
            deleted: false,
            subscriptions: None,
        };
        state.customers.insert(customer.id.clone(), customer.clone());
        Ok(customer)
    }

    async fn update_customer_email(
        &self,
        customer_id: &str,
        email: &str,
    ) -> Result<StripeCustomerObject, BillingError> {
        let mut state = self.state();
        state.record("update_customer_email", &[customer_id, email])?;
        let customer = state
            .customers
            .get_mut(customer_id)
            .ok_or_else(|| BillingError::missing(customer_id))?;
        customer.email = Some(email.to_string());
        Ok(customer.clone())
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, BillingError> {
        let mut state = self.state();
        state.record("get_subscription", &[subscription_id])?;
        state.subscription_mut(subscription_id).map(|s| s.clone())
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
    ) -> Result<StripeSubscription, BillingError> {
        let mut state = self.state();
        state.record("create_subscription", &[customer_id, price_id])?;
        if !state.customers.contains_key(customer_id) {
            return Err(BillingError::missing(customer_id));
        }
        let price = state.price(price_id)?;
        let id = state.next_id("sub");
        let subscription = subscription_snapshot(&id, customer_id, &price, SubscriptionStatus::Active);
        state.subscriptions.insert(id, subscription.clone());
        Ok(subscription)
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, BillingError> {
        let mut state = self.state();
        state.record("cancel_subscription", &[subscription_id])?;
        let subscription = state.subscription_mut(subscription_id)?;
        subscription.status = SubscriptionStatus::Canceled;
        Ok(subscription.clone())
    }

    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel: bool,
        reason: Option<&str>,
    ) -> Result<StripeSubscription, BillingError> {
        let mut state = self.state();
        let flag = if cancel { "true" } else { "false" };
        state.record("set_cancel_at_period_end", &[subscription_id, flag])?;
        let subscription = state.subscription_mut(subscription_id)?;
        subscription.cancel_at_period_end = cancel;
        match reason.filter(|_| cancel) {
            Some(reason) => {
                subscription
                    .metadata
                    .insert("cancellation_reason".to_string(), reason.to_string());
            }
            None => {
                subscription.metadata.remove("cancellation_reason");
            }
        }
        Ok(subscription.clone())
    }

    async fn change_plan(
        &self,
        subscription_id: &str,
        price_id: &str,
    ) -> Result<StripeSubscription, BillingError> {
        let mut state = self.state();
        state.record("change_plan", &[subscription_id, price_id])?;
        let price = state.price(price_id)?;
        let subscription = state.subscription_mut(subscription_id)?;
        if let Some(item) = subscription.items.data.first_mut() {
            item.price = Some(price);
            item.plan = None;
        }
        subscription.cancel_at_period_end = false;
        Ok(subscription.clone())
    }

    async fn update_default_payment_method(
        &self,
        subscription_id: &str,
        payment_method_id: &str,
    ) -> Result<StripeSubscription, BillingError> {
        let mut state = self.state();
        state.record("update_default_payment_method", &[subscription_id, payment_method_id])?;
        let reference = match state.payment_methods.get(payment_method_id) {
            Some(method) => PaymentMethodRef::Expanded(method.clone()),
            None => PaymentMethodRef::Id(payment_method_id.to_string()),
        };
        let subscription = state.subscription_mut(subscription_id)?;
        subscription.default_payment_method = Some(reference);
        Ok(subscription.clone())
    }

    async fn get_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<StripePaymentMethod, BillingError> {
        let mut state = self.state();
        state.record("get_payment_method", &[payment_method_id])?;
        state
            .payment_methods
            .get(payment_method_id)
            .cloned()
            .ok_or_else(|| BillingError::missing(payment_method_id))
    }

    async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> Result<StripePaymentMethod, BillingError> {
        let mut state = self.state();
        state.record("attach_payment_method", &[payment_method_id, customer_id])?;
        let method = state
            .payment_methods
            .get_mut(payment_method_id)
            .ok_or_else(|| BillingError::missing(payment_method_id))?;
        method.customer = Some(customer_id.to_string());
        Ok(method.clone())
    }

    async fn get_setup_intent(
        &self,
        setup_intent_id: &str,
    ) -> Result<StripeSetupIntent, BillingError> {
        let mut state = self.state();
        state.record("get_setup_intent", &[setup_intent_id])?;
        state
            .setup_intents
            .get(setup_intent_id)
            .cloned()
            .ok_or_else(|| BillingError::missing(setup_intent_id))
    }

    async fn ensure_product(&self, name: &str) -> Result<StripeProduct, BillingError> {
        let mut state = self.state();
        state.record("ensure_product", &[name])?;
        if let Some(product) = state.products.values().find(|p| p.active && p.name == name) {
            return Ok(product.clone());
        }
        let product = StripeProduct {
            id: state.next_id("prod"),
            name: name.to_string(),
            active: true,
        };
        state.products.insert(product.id.clone(), product.clone());
        Ok(product)
    }

    async fn ensure_price(&self, spec: &PriceSpec) -> Result<StripePrice, BillingError> {
        let mut state = self.state();
        let seed = spec.seed();
        state.record("ensure_price", &[seed.as_str()])?;
        let currency = spec.currency.to_lowercase();
        let existing = state.prices.values().find(|p| {
            p.active
                && p.product == spec.product_id
                && p.currency == currency
                && p.unit_amount == Some(spec.amount)
                && p.recurring.map(|r| r.interval) == Some(spec.interval)
        });
        if let Some(price) = existing {
            return Ok(price.clone());
        }
        let mut price = recurring_price(&state.next_id("price"), spec.amount, &currency, spec.interval);
        price.product = spec.product_id.clone();
        price.nickname = spec.nickname.clone();
        state.prices.insert(price.id.clone(), price.clone());
        Ok(price)
    }

    async fn create_webhook_endpoint(
        &self,
        url: &str,
        enabled_events: &[&str],
    ) -> Result<StripeWebhookEndpoint, BillingError> {
        let mut state = self.state();
        state.record("create_webhook_endpoint", &[url])?;
        let id = state.next_id("we");
        let endpoint = StripeWebhookEndpoint {
            secret: Some(format!("whsec_{}", id)),
            id,
            url: url.to_string(),
            enabled_events: enabled_events.iter().map(|e| e.to_string()).collect(),
        };
        let stored = StripeWebhookEndpoint {
            secret: None,
            ..endpoint.clone()
        };
        state.endpoints.insert(endpoint.id.clone(), stored);
        Ok(endpoint)
    }

    async fn update_webhook_endpoint(
        &self,
        endpoint_id: &str,
        url: &str,
        enabled_events: &[&str],
    ) -> Result<StripeWebhookEndpoint, BillingError> {
        let mut state = self.state();
        state.record("update_webhook_endpoint", &[endpoint_id, url])?;
        let endpoint = state
            .endpoints
            .get_mut(endpoint_id)
            .ok_or_else(|| BillingError::missing(endpoint_id))?;
        endpoint.url = url.to_string();
        endpoint.enabled_events = enabled_events.iter().map(|e| e.to_string()).collect();
        Ok(endpoint.clone())
    }

    async fn delete_webhook_endpoint(&self, endpoint_id: &str) -> Result<(), BillingError> {
        let mut state = self.state();
        state.record("delete_webhook_endpoint", &[endpoint_id])?;
        state
            .endpoints
            .remove(endpoint_id)
            .map(|_| ())
            .ok_or_else(|| BillingError::missing(endpoint_id))
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Fixtures
// ════════════════════════════════════════════════════════════════════════════════

/// An active recurring price.
pub fn recurring_price(id: &str, amount: i64, currency: &str, interval: PlanInterval) -> StripePrice {
    StripePrice {
        id: id.to_string(),
        product: "prod_default".to_string(),
        active: true,
        nickname: None,
        currency: currency.to_string(),
        unit_amount: Some(amount),
        recurring: Some(Recurring { interval }),
    }
}

/// A single-item subscription on `price` in its first billing period.
pub fn subscription_snapshot(
    id: &str,
    customer_id: &str,
    price: &StripePrice,
    status: SubscriptionStatus,
) -> StripeSubscription {
    let now = Timestamp::now().as_unix_secs();
    StripeSubscription {
        id: id.to_string(),
        customer: customer_id.to_string(),
        status,
        cancel_at_period_end: false,
        metadata: HashMap::new(),
        current_period_end: now + PERIOD_SECS,
        start_date: now,
        default_payment_method: None,
        items: StripeList::of(vec![SubscriptionItem {
            id: format!("si_{}", id),
            price: Some(price.clone()),
            plan: None,
        }]),
    }
}
