//! Stripe resource shapes.
//!
//! Only the fields the reconciliation engine consumes are captured; the rest
//! of Stripe's schema is ignored on deserialization.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::member::{MemberError, PlanInterval, PlanSnapshot, SubscriptionStatus};

/// A page of a Stripe list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

impl<T> StripeList<T> {
    pub fn of(data: Vec<T>) -> Self {
        Self {
            data,
            has_more: false,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscriptions
// ════════════════════════════════════════════════════════════════════════════════

/// Full subscription snapshot, as returned by the API or carried in a webhook.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Epoch seconds.
    pub current_period_end: i64,
    /// Epoch seconds.
    pub start_date: i64,
    #[serde(default)]
    pub default_payment_method: Option<PaymentMethodRef>,
    pub items: StripeList<SubscriptionItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SubscriptionItem {
    pub id: String,
    #[serde(default)]
    pub price: Option<StripePrice>,
    /// Legacy plan object, present on older subscriptions.
    #[serde(default)]
    pub plan: Option<StripePlan>,
}

impl StripeSubscription {
    /// Normalizes the subscription's only line item.
    ///
    /// Zero or several line items, or an item with neither a recurring price
    /// nor a plan, is a malformed snapshot.
    pub fn single_plan(&self) -> Result<PlanSnapshot, MemberError> {
        let item = match self.items.data.as_slice() {
            [item] => item,
            items => {
                return Err(MemberError::malformed(
                    &self.id,
                    format!("expected exactly one line item, found {}", items.len()),
                ))
            }
        };

        if let Some(price) = &item.price {
            let recurring = price
                .recurring
                .as_ref()
                .ok_or_else(|| MemberError::malformed(&self.id, "price is not recurring"))?;
            let amount = price
                .unit_amount
                .ok_or_else(|| MemberError::malformed(&self.id, "price has no unit_amount"))?;
            return Ok(PlanSnapshot {
                id: price.id.clone(),
                nickname: price.nickname.clone(),
                interval: recurring.interval,
                currency: price.currency.to_lowercase(),
                amount,
                product: Some(price.product.clone()),
            });
        }

        if let Some(plan) = &item.plan {
            let amount = plan
                .amount
                .ok_or_else(|| MemberError::malformed(&self.id, "plan has no amount"))?;
            return Ok(PlanSnapshot {
                id: plan.id.clone(),
                nickname: plan.nickname.clone(),
                interval: plan.interval,
                currency: plan.currency.to_lowercase(),
                amount,
                product: plan.product.clone(),
            });
        }

        Err(MemberError::malformed(&self.id, "line item has neither price nor plan"))
    }

    /// Price id of the only line item, without validating the rest.
    pub fn first_price_id(&self) -> Option<&str> {
        let item = self.items.data.first()?;
        item.price
            .as_ref()
            .map(|p| p.id.as_str())
            .or_else(|| item.plan.as_ref().map(|p| p.id.as_str()))
    }
}

/// Either a bare id or the expanded object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PaymentMethodRef {
    Id(String),
    Expanded(StripePaymentMethod),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StripePaymentMethod {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub card: Option<CardDetails>,
    #[serde(default)]
    pub billing_details: Option<BillingDetails>,
}

impl StripePaymentMethod {
    pub fn card_last4(&self) -> Option<String> {
        self.card.as_ref().map(|c| c.last4.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CardDetails {
    pub last4: String,
    #[serde(default)]
    pub brand: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BillingDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Catalog
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StripeProduct {
    pub id: String,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StripePrice {
    pub id: String,
    pub product: String,
    pub active: bool,
    #[serde(default)]
    pub nickname: Option<String>,
    pub currency: String,
    #[serde(default)]
    pub unit_amount: Option<i64>,
    #[serde(default)]
    pub recurring: Option<Recurring>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Recurring {
    pub interval: PlanInterval,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StripePlan {
    pub id: String,
    #[serde(default)]
    pub nickname: Option<String>,
    pub interval: PlanInterval,
    pub currency: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub product: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Customers, invoices, checkout
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StripeCustomerObject {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub subscriptions: Option<StripeList<StripeSubscription>>,
}

impl StripeCustomerObject {
    /// Subscriptions embedded in the customer, empty when not expanded.
    pub fn subscription_snapshots(&self) -> &[StripeSubscription] {
        self.subscriptions
            .as_ref()
            .map(|list| list.data.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StripeInvoice {
    pub id: String,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub paid: bool,
    pub amount_paid: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutMode {
    Payment,
    Setup,
    Subscription,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CheckoutMetadata {
    #[serde(default, rename = "checkoutType")]
    pub checkout_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub offer: Option<String>,
    #[serde(default, rename = "requestSrc")]
    pub request_src: Option<String>,
}

impl CheckoutMetadata {
    /// Upgrades of an existing member do not get a signup email.
    pub fn is_upgrade(&self) -> bool {
        self.checkout_type.as_deref() == Some("upgrade")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub mode: CheckoutMode,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub setup_intent: Option<String>,
    #[serde(default)]
    pub metadata: CheckoutMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SetupIntentMetadata {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub subscription_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StripeSetupIntent {
    pub id: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub metadata: SetupIntentMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StripeWebhookEndpoint {
    pub id: String,
    /// Only returned on creation.
    #[serde(default)]
    pub secret: Option<String>,
    pub url: String,
    #[serde(default)]
    pub enabled_events: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payment_method_accepts_id_or_object() {
        let by_id: PaymentMethodRef = serde_json::from_value(json!("pm_1")).unwrap();
        assert_eq!(by_id, PaymentMethodRef::Id("pm_1".into()));

        let expanded: PaymentMethodRef =
            serde_json::from_value(json!({"id": "pm_2", "card": {"last4": "4242"}})).unwrap();
        match expanded {
            PaymentMethodRef::Expanded(method) => {
                assert_eq!(method.card_last4().as_deref(), Some("4242"))
            }
            other => panic!("expected expanded payment method, got {:?}", other),
        }
    }

    #[test]
    fn checkout_session_reads_camel_case_metadata() {
        let session: StripeCheckoutSession = serde_json::from_value(json!({
            "id": "cs_1",
            "mode": "subscription",
            "customer": "cus_1",
            "metadata": {"checkoutType": "upgrade", "requestSrc": "portal", "offer": "o_1"}
        }))
        .unwrap();

        assert_eq!(session.mode, CheckoutMode::Subscription);
        assert!(session.metadata.is_upgrade());
        assert_eq!(session.metadata.offer.as_deref(), Some("o_1"));
        assert_eq!(session.metadata.request_src.as_deref(), Some("portal"));
    }

    #[test]
    fn checkout_session_without_metadata_is_not_upgrade() {
        let session: StripeCheckoutSession =
            serde_json::from_value(json!({"id": "cs_1", "mode": "setup", "setup_intent": "seti_1"}))
                .unwrap();

        assert!(!session.metadata.is_upgrade());
        assert_eq!(session.setup_intent.as_deref(), Some("seti_1"));
    }

    #[test]
    fn customer_without_expanded_subscriptions_has_none() {
        let customer: StripeCustomerObject =
            serde_json::from_value(json!({"id": "cus_1", "email": "a@b.co"})).unwrap();

        assert!(customer.subscription_snapshots().is_empty());
        assert!(!customer.deleted);
    }

    #[test]
    fn price_without_recurring_is_malformed_for_a_subscription() {
        let subscription: StripeSubscription = serde_json::from_value(json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "active",
            "current_period_end": 1,
            "start_date": 1,
            "items": {"data": [{
                "id": "si_1",
                "price": {"id": "price_1", "product": "prod_1", "active": true,
                          "currency": "usd", "unit_amount": 500}
            }]}
        }))
        .unwrap();

        assert!(matches!(
            subscription.single_plan(),
            Err(MemberError::MalformedSubscriptionSnapshot { .. })
        ));
        assert_eq!(subscription.first_price_id(), Some("price_1"));
    }
}
