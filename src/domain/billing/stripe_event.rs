//! Stripe webhook event envelope and its classification into handler kinds.

use serde::{Deserialize, Serialize};

use super::resources::{StripeCheckoutSession, StripeInvoice, StripeSubscription};
use super::webhook_errors::WebhookError;

/// Stripe webhook event (simplified).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    /// Unique identifier for the event (evt_xxx format).
    pub id: String,

    /// Type of event (e.g., "customer.subscription.updated").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time at which the event was created (Unix timestamp).
    pub created: i64,

    pub data: StripeEventData,

    #[serde(default)]
    pub livemode: bool,

    #[serde(default)]
    pub api_version: Option<String>,
}

/// Container for event-specific data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object that triggered the event (polymorphic based on event type).
    pub object: serde_json::Value,

    /// Previous values for updated attributes (only for update events).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_attributes: Option<serde_json::Value>,
}

impl StripeEvent {
    /// Attempts to deserialize the data object as the specified type.
    pub fn deserialize_object<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }

    /// Parse the event type into a known enum variant.
    pub fn parsed_type(&self) -> StripeEventType {
        StripeEventType::parse(&self.event_type)
    }

    /// Maps the event onto exactly one handler kind.
    ///
    /// Unknown types classify as `Ignored` so new provider events are
    /// acknowledged rather than failed.
    pub fn classify(&self) -> Result<ClassifiedEvent, WebhookError> {
        let classified = match self.parsed_type() {
            StripeEventType::CustomerSubscriptionCreated
            | StripeEventType::CustomerSubscriptionUpdated
            | StripeEventType::CustomerSubscriptionDeleted => {
                ClassifiedEvent::SubscriptionChanged(self.deserialize_object()?)
            }
            StripeEventType::InvoicePaymentSucceeded => {
                ClassifiedEvent::InvoicePaymentSucceeded(self.deserialize_object()?)
            }
            StripeEventType::CheckoutSessionCompleted => {
                ClassifiedEvent::CheckoutSessionCompleted(self.deserialize_object()?)
            }
            StripeEventType::Unknown => ClassifiedEvent::Ignored(self.event_type.clone()),
        };
        Ok(classified)
    }
}

/// Known Stripe event types that we handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripeEventType {
    CheckoutSessionCompleted,
    CustomerSubscriptionCreated,
    CustomerSubscriptionUpdated,
    CustomerSubscriptionDeleted,
    InvoicePaymentSucceeded,
    /// Unknown or unhandled event type.
    Unknown,
}

impl StripeEventType {
    /// Every handled type, in the order registered on the webhook endpoint.
    pub const HANDLED: [StripeEventType; 5] = [
        StripeEventType::CheckoutSessionCompleted,
        StripeEventType::CustomerSubscriptionDeleted,
        StripeEventType::CustomerSubscriptionUpdated,
        StripeEventType::CustomerSubscriptionCreated,
        StripeEventType::InvoicePaymentSucceeded,
    ];

    pub fn parse(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "customer.subscription.created" => Self::CustomerSubscriptionCreated,
            "customer.subscription.updated" => Self::CustomerSubscriptionUpdated,
            "customer.subscription.deleted" => Self::CustomerSubscriptionDeleted,
            "invoice.payment_succeeded" => Self::InvoicePaymentSucceeded,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::CustomerSubscriptionCreated => "customer.subscription.created",
            Self::CustomerSubscriptionUpdated => "customer.subscription.updated",
            Self::CustomerSubscriptionDeleted => "customer.subscription.deleted",
            Self::InvoicePaymentSucceeded => "invoice.payment_succeeded",
            Self::Unknown => "unknown",
        }
    }
}

/// A verified event resolved to its handler and typed payload.
#[derive(Debug, Clone)]
pub enum ClassifiedEvent {
    /// `customer.subscription.{created,updated,deleted}`.
    SubscriptionChanged(StripeSubscription),
    InvoicePaymentSucceeded(StripeInvoice),
    CheckoutSessionCompleted(StripeCheckoutSession),
    /// Event type with no handler.
    Ignored(String),
}

impl ClassifiedEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifiedEvent::SubscriptionChanged(_) => "subscription_changed",
            ClassifiedEvent::InvoicePaymentSucceeded(_) => "invoice_payment_succeeded",
            ClassifiedEvent::CheckoutSessionCompleted(_) => "checkout_session_completed",
            ClassifiedEvent::Ignored(_) => "ignored",
        }
    }
}

/// Builder for creating test StripeEvent instances.
#[cfg(test)]
pub struct StripeEventBuilder {
    id: String,
    event_type: String,
    created: i64,
    object: serde_json::Value,
    livemode: bool,
}

#[cfg(test)]
impl Default for StripeEventBuilder {
    fn default() -> Self {
        Self {
            id: "evt_test_123".to_string(),
            event_type: "checkout.session.completed".to_string(),
            created: chrono::Utc::now().timestamp(),
            object: serde_json::json!({}),
            livemode: false,
        }
    }
}

#[cfg(test)]
impl StripeEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn object(mut self, object: serde_json::Value) -> Self {
        self.object = object;
        self
    }

    pub fn build(self) -> StripeEvent {
        StripeEvent {
            id: self.id,
            event_type: self.event_type,
            created: self.created,
            data: StripeEventData {
                object: self.object,
                previous_attributes: None,
            },
            livemode: self.livemode,
            api_version: Some("2023-10-16".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn subscription_object() -> serde_json::Value {
        json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "active",
            "current_period_end": 1_706_745_600,
            "start_date": 1_704_067_200,
            "items": {"data": [{
                "id": "si_1",
                "price": {"id": "price_1", "product": "prod_1", "active": true,
                          "currency": "usd", "unit_amount": 500,
                          "recurring": {"interval": "month"}}
            }]}
        })
    }

    // ══════════════════════════════════════════════════════════════
    // Deserialization Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn deserialize_minimal_event() {
        let json = r#"{
            "id": "evt_1234567890",
            "type": "checkout.session.completed",
            "created": 1704067200,
            "data": {"object": {}}
        }"#;

        let event: StripeEvent = serde_json::from_str(json).unwrap();

        assert_eq!(event.id, "evt_1234567890");
        assert_eq!(event.created, 1704067200);
        assert!(!event.livemode);
        assert!(event.api_version.is_none());
    }

    #[test]
    fn deserialize_event_with_previous_attributes() {
        let json = r#"{
            "id": "evt_update_123",
            "type": "customer.subscription.updated",
            "created": 1704067200,
            "data": {
                "object": {"status": "active"},
                "previous_attributes": {"status": "past_due"}
            },
            "livemode": true
        }"#;

        let event: StripeEvent = serde_json::from_str(json).unwrap();

        let prev = event.data.previous_attributes.unwrap();
        assert_eq!(prev["status"], "past_due");
    }

    // ══════════════════════════════════════════════════════════════
    // Classification Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn subscription_events_share_one_handler() {
        for event_type in [
            "customer.subscription.created",
            "customer.subscription.updated",
            "customer.subscription.deleted",
        ] {
            let event = StripeEventBuilder::new()
                .event_type(event_type)
                .object(subscription_object())
                .build();

            match event.classify().unwrap() {
                ClassifiedEvent::SubscriptionChanged(sub) => assert_eq!(sub.id, "sub_1"),
                other => panic!("{} classified as {}", event_type, other.kind()),
            }
        }
    }

    #[test]
    fn invoice_event_carries_invoice() {
        let event = StripeEventBuilder::new()
            .event_type("invoice.payment_succeeded")
            .object(json!({"id": "in_1", "subscription": "sub_1", "paid": true,
                           "amount_paid": 500, "currency": "usd"}))
            .build();

        match event.classify().unwrap() {
            ClassifiedEvent::InvoicePaymentSucceeded(invoice) => {
                assert_eq!(invoice.subscription.as_deref(), Some("sub_1"))
            }
            other => panic!("classified as {}", other.kind()),
        }
    }

    #[test]
    fn unknown_type_is_ignored_not_failed() {
        let event = StripeEventBuilder::new()
            .event_type("customer.discount.created")
            .object(json!({"whatever": true}))
            .build();

        assert!(matches!(event.classify().unwrap(), ClassifiedEvent::Ignored(t) if t == "customer.discount.created"));
    }

    #[test]
    fn known_type_with_wrong_shape_is_parse_error() {
        let event = StripeEventBuilder::new()
            .event_type("invoice.payment_succeeded")
            .object(json!({"id": "in_1"}))
            .build();

        assert!(matches!(event.classify(), Err(WebhookError::ParseError(_))));
    }

    #[test]
    fn event_type_as_str_roundtrip() {
        for event_type in StripeEventType::HANDLED {
            assert_eq!(StripeEventType::parse(event_type.as_str()), event_type);
        }
        assert_eq!(StripeEventType::parse("some.unknown.event"), StripeEventType::Unknown);
    }
}
