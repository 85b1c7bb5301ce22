//! Integration tests for signed Stripe deliveries.
//!
//! These tests verify the end-to-end flow:
//! 1. A raw payload is signed the way Stripe signs it
//! 2. The ingress verifies, classifies and dispatches it
//! 3. Handlers reconcile members, subscriptions and the ledger
//! 4. Redeliveries are acknowledged without running handlers again

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use members_billing::adapters::stripe::{recurring_price, subscription_snapshot, MockBillingGateway};
use members_billing::adapters::{
    InMemoryEventBus, InMemoryEventLedger, InMemoryMemberStore, InMemoryProductCatalog,
    InMemoryWebhookEventRepository, RecordingMailer,
};
use members_billing::application::{
    BillingDefaults, MemberRepository, StripeWebhookService, WebhookIngress,
};
use members_billing::domain::billing::{
    signature_header, IdempotentWebhookProcessor, StripeCustomerObject, StripeSubscription,
    SubscriptionItem, WebhookError,
};
use members_billing::domain::member::{
    MemberSelector, MemberStatus, PlanInterval, Product, ProductPrice, SubscriptionStatus,
};
use members_billing::ports::{EventLedger, HandledAs, WebhookEventRepository, WebhookResult};

const SECRET: &str = "whsec_integration";

// =============================================================================
// Test Infrastructure
// =============================================================================

type Ingress = WebhookIngress<InMemoryWebhookEventRepository, StripeWebhookService>;

struct Harness {
    ledger: Arc<InMemoryEventLedger>,
    billing: MockBillingGateway,
    bus: Arc<InMemoryEventBus>,
    mailer: Arc<RecordingMailer>,
    repo: Arc<MemberRepository>,
    ingress: Ingress,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryMemberStore::new());
    let ledger = Arc::new(InMemoryEventLedger::new());
    let catalog = Arc::new(InMemoryProductCatalog::with_products(vec![Product {
        id: "product_gold".into(),
        name: "Gold".into(),
        stripe_product_id: "prod_default".into(),
        prices: vec![ProductPrice {
            stripe_price_id: "price_monthly".into(),
            currency: "usd".into(),
            amount: 500,
            interval: PlanInterval::Month,
            nickname: None,
            active: true,
        }],
    }]));
    let billing = MockBillingGateway::new();
    let bus = Arc::new(InMemoryEventBus::new());
    let mailer = Arc::new(RecordingMailer::new());

    let repo = Arc::new(MemberRepository::new(
        store,
        ledger.clone(),
        catalog,
        Arc::new(billing.clone()),
        BillingDefaults::default(),
    ));
    let service = StripeWebhookService::new(repo.clone(), bus.clone(), mailer.clone());
    let ingress = WebhookIngress::new(
        IdempotentWebhookProcessor::new(InMemoryWebhookEventRepository::new(), service),
        Arc::new(billing.clone()),
        SECRET,
        Duration::from_secs(5),
    );

    Harness {
        ledger,
        billing,
        bus,
        mailer,
        repo,
        ingress,
    }
}

fn payload(event_id: &str, event_type: &str, object: Value) -> Vec<u8> {
    json!({
        "id": event_id,
        "type": event_type,
        "created": chrono::Utc::now().timestamp(),
        "livemode": false,
        "api_version": "2023-10-16",
        "data": {"object": object}
    })
    .to_string()
    .into_bytes()
}

async fn deliver(h: &Harness, payload: &[u8]) -> Result<WebhookResult, WebhookError> {
    let signature = signature_header(SECRET, chrono::Utc::now().timestamp(), payload);
    h.ingress.receive(payload, &signature).await.map(|ack| ack.result)
}

/// Customer cus_1 with one active monthly subscription sub_1.
fn seed_provider(h: &Harness) -> StripeSubscription {
    h.billing.add_customer(StripeCustomerObject {
        id: "cus_1".into(),
        email: Some("ada@example.com".into()),
        name: None,
        deleted: false,
        subscriptions: None,
    });
    let subscription = subscription_snapshot(
        "sub_1",
        "cus_1",
        &recurring_price("price_monthly", 500, "usd", PlanInterval::Month),
        SubscriptionStatus::Active,
    );
    h.billing.add_subscription(subscription.clone());
    subscription
}

fn checkout_payload(event_id: &str) -> Vec<u8> {
    payload(
        event_id,
        "checkout.session.completed",
        json!({
            "id": "cs_1",
            "mode": "subscription",
            "customer": "cus_1",
            "subscription": "sub_1",
            "metadata": {"name": "Ada Lovelace", "requestSrc": "signup-form"}
        }),
    )
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn checkout_creates_member_once_across_redelivery() {
    let h = harness();
    seed_provider(&h);
    let body = checkout_payload("evt_checkout");

    assert_eq!(deliver(&h, &body).await.unwrap(), WebhookResult::Processed);
    assert_eq!(deliver(&h, &body).await.unwrap(), WebhookResult::AlreadyProcessed);

    let member = h
        .repo
        .get(&MemberSelector::Email("ada@example.com".into()))
        .await
        .unwrap();
    assert_eq!(member.name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(member.status, MemberStatus::Paid);
    assert_eq!(h.mailer.sent().await.len(), 1);
    assert_eq!(h.bus.events_of_type("member.subscription_created.v1").len(), 1);
    assert_eq!(
        h.ledger.paid_subscription_events_for(&member.id).await.unwrap().len(),
        1
    );
}

// =============================================================================
// Invoices
// =============================================================================

#[tokio::test]
async fn invoice_deliveries_register_one_payment() {
    let h = harness();
    seed_provider(&h);
    deliver(&h, &checkout_payload("evt_checkout")).await.unwrap();
    let invoice = json!({
        "id": "in_1",
        "subscription": "sub_1",
        "customer": "cus_1",
        "paid": true,
        "amount_paid": 500,
        "currency": "usd"
    });

    // Two distinct events for the same invoice.
    deliver(&h, &payload("evt_inv_1", "invoice.payment_succeeded", invoice.clone()))
        .await
        .unwrap();
    deliver(&h, &payload("evt_inv_2", "invoice.payment_succeeded", invoice))
        .await
        .unwrap();

    let member = h
        .repo
        .get(&MemberSelector::CustomerId("cus_1".into()))
        .await
        .unwrap();
    let payments = h.ledger.payments_for(&member.id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].invoice_id, "in_1");
}

// =============================================================================
// Subscription changes
// =============================================================================

#[tokio::test]
async fn subscription_deleted_downgrades_member() {
    let h = harness();
    let mut subscription = seed_provider(&h);
    deliver(&h, &checkout_payload("evt_checkout")).await.unwrap();

    subscription.status = SubscriptionStatus::Canceled;
    h.billing.add_subscription(subscription.clone());
    let body = payload(
        "evt_deleted",
        "customer.subscription.deleted",
        serde_json::to_value(&subscription).unwrap(),
    );

    assert_eq!(deliver(&h, &body).await.unwrap(), WebhookResult::Processed);

    let member = h
        .repo
        .get(&MemberSelector::CustomerId("cus_1".into()))
        .await
        .unwrap();
    assert_eq!(member.status, MemberStatus::Free);
    let deltas: i64 = h
        .ledger
        .paid_subscription_events_for(&member.id)
        .await
        .unwrap()
        .iter()
        .map(|e| e.mrr_delta)
        .sum();
    assert_eq!(deltas, 0);
}

/// Delivers a checkout and an older `subscription.updated` for the same
/// subscription, in the given order, after the provider has moved it to the
/// yearly price. Returns the member's row and cumulative MRR.
async fn deliver_checkout_and_update(update_first: bool) -> (String, SubscriptionStatus, i64, MemberStatus) {
    let h = harness();
    let older = seed_provider(&h);
    let mut current = subscription_snapshot(
        "sub_1",
        "cus_1",
        &recurring_price("price_yearly", 12000, "usd", PlanInterval::Year),
        SubscriptionStatus::Active,
    );
    current.items.data[0].id = older.items.data[0].id.clone();
    h.billing.add_subscription(current);

    let checkout = checkout_payload("evt_checkout");
    let update = payload(
        "evt_updated",
        "customer.subscription.updated",
        serde_json::to_value(&older).unwrap(),
    );
    let deliveries = if update_first {
        [update, checkout]
    } else {
        [checkout, update]
    };
    for body in &deliveries {
        assert_eq!(deliver(&h, body).await.unwrap(), WebhookResult::Processed);
    }

    let member = h
        .repo
        .get(&MemberSelector::CustomerId("cus_1".into()))
        .await
        .unwrap();
    let rows = h.repo.subscriptions(&member.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    let mrr: i64 = h
        .ledger
        .paid_subscription_events_for(&member.id)
        .await
        .unwrap()
        .iter()
        .map(|e| e.mrr_delta)
        .sum();
    (rows[0].plan_id.clone(), rows[0].status, mrr, member.status)
}

#[tokio::test]
async fn checkout_and_update_converge_in_either_order() {
    let checkout_first = deliver_checkout_and_update(false).await;
    let update_first = deliver_checkout_and_update(true).await;

    let expected = (
        "price_yearly".to_string(),
        SubscriptionStatus::Active,
        1000,
        MemberStatus::Paid,
    );
    assert_eq!(checkout_first, expected);
    assert_eq!(update_first, expected);
}

#[tokio::test]
async fn foreign_customer_is_acknowledged_as_ignored() {
    let h = harness();
    let foreign = subscription_snapshot(
        "sub_other",
        "cus_other",
        &recurring_price("price_monthly", 500, "usd", PlanInterval::Month),
        SubscriptionStatus::Active,
    );
    let body = payload(
        "evt_foreign",
        "customer.subscription.updated",
        serde_json::to_value(&foreign).unwrap(),
    );

    assert_eq!(deliver(&h, &body).await.unwrap(), WebhookResult::Processed);

    let record = h
        .ingress
        .processor()
        .repository()
        .find_by_event_id("evt_foreign")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.handled_as, HandledAs::Ignored);
}

#[tokio::test]
async fn malformed_subscription_is_rejected_without_retry() {
    let h = harness();
    let mut malformed = subscription_snapshot(
        "sub_bad",
        "cus_1",
        &recurring_price("price_monthly", 500, "usd", PlanInterval::Month),
        SubscriptionStatus::Active,
    );
    malformed.items.data.push(SubscriptionItem {
        id: "si_extra".into(),
        price: Some(recurring_price("price_monthly", 500, "usd", PlanInterval::Month)),
        plan: None,
    });
    let body = payload(
        "evt_bad",
        "customer.subscription.updated",
        serde_json::to_value(&malformed).unwrap(),
    );

    let err = deliver(&h, &body).await.unwrap_err();

    assert_eq!(err.status_code(), 400);
    assert!(!err.is_retryable());
    assert!(!h.ingress.processor().already_processed("evt_bad").await.unwrap());
}

#[tokio::test]
async fn tampered_payload_is_unauthorized() {
    let h = harness();
    let body = checkout_payload("evt_checkout");
    let signature = signature_header(SECRET, chrono::Utc::now().timestamp(), &body);
    let mut tampered = body.clone();
    tampered.extend_from_slice(b" ");

    let err = h.ingress.receive(&tampered, &signature).await.unwrap_err();

    assert_eq!(err.status_code(), 401);
}
