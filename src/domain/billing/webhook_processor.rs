//! Webhook processor - Orchestrates idempotent webhook event handling.
//!
//! The processor follows these steps:
//! 1. Skip events already recorded as handled
//! 2. Dispatch the classified event to its handler
//! 3. Record successful and ignored outcomes
//!
//! Failed events are deliberately left unrecorded so Stripe's redelivery
//! runs the handler again. When two deliveries race, the first save wins
//! and the other reports `AlreadyProcessed`.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookResult};

use super::resources::{StripeCheckoutSession, StripeInvoice, StripeSubscription};
use super::stripe_event::{ClassifiedEvent, StripeEvent};
use super::webhook_errors::WebhookError;

/// Static dispatch table: one handler per classified event kind.
///
/// Handlers must be idempotent; the same event may be delivered any number
/// of times and in any order relative to other events.
#[async_trait]
pub trait WebhookDispatcher: Send + Sync {
    async fn subscription_changed(
        &self,
        event: &StripeEvent,
        subscription: StripeSubscription,
    ) -> Result<(), WebhookError>;

    async fn invoice_payment_succeeded(
        &self,
        event: &StripeEvent,
        invoice: StripeInvoice,
    ) -> Result<(), WebhookError>;

    async fn checkout_session_completed(
        &self,
        event: &StripeEvent,
        session: StripeCheckoutSession,
    ) -> Result<(), WebhookError>;

    /// Routes a classified event. `Ignored` kinds never reach a handler.
    async fn dispatch(
        &self,
        event: &StripeEvent,
        classified: ClassifiedEvent,
    ) -> Result<(), WebhookError> {
        match classified {
            ClassifiedEvent::SubscriptionChanged(subscription) => {
                self.subscription_changed(event, subscription).await
            }
            ClassifiedEvent::InvoicePaymentSucceeded(invoice) => {
                self.invoice_payment_succeeded(event, invoice).await
            }
            ClassifiedEvent::CheckoutSessionCompleted(session) => {
                self.checkout_session_completed(event, session).await
            }
            ClassifiedEvent::Ignored(event_type) => Err(WebhookError::Ignored(format!(
                "No handler for event type: {}",
                event_type
            ))),
        }
    }
}

/// Processes webhook events with idempotency guarantees.
pub struct IdempotentWebhookProcessor<R: WebhookEventRepository, D: WebhookDispatcher> {
    repository: R,
    dispatcher: D,
}

impl<R: WebhookEventRepository, D: WebhookDispatcher> IdempotentWebhookProcessor<R, D> {
    pub fn new(repository: R, dispatcher: D) -> Self {
        Self {
            repository,
            dispatcher,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub async fn already_processed(&self, event_id: &str) -> Result<bool, WebhookError> {
        Ok(self.repository.find_by_event_id(event_id).await?.is_some())
    }

    /// Handles a classified event at most once per successful outcome.
    ///
    /// - `Ok(Processed)` - handled, or acknowledged as ignored
    /// - `Ok(AlreadyProcessed)` - a previous delivery already succeeded
    /// - `Err(_)` - handler failed; nothing is recorded
    pub async fn process(
        &self,
        event: &StripeEvent,
        classified: ClassifiedEvent,
    ) -> Result<WebhookResult, WebhookError> {
        if self.already_processed(&event.id).await? {
            return Ok(WebhookResult::AlreadyProcessed);
        }

        let payload = serde_json::to_value(event)?;
        let record = match self.dispatcher.dispatch(event, classified).await {
            Ok(()) => WebhookEventRecord::success(&event.id, &event.event_type, payload),
            Err(WebhookError::Ignored(reason)) => {
                tracing::debug!(event_id = %event.id, reason = %reason, "webhook event ignored");
                WebhookEventRecord::ignored(&event.id, &event.event_type, reason, payload)
            }
            Err(e) => return Err(e),
        };

        match self.repository.save(record).await? {
            SaveResult::Inserted => Ok(WebhookResult::Processed),
            SaveResult::AlreadyExists => Ok(WebhookResult::AlreadyProcessed),
        }
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        WebhookError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryWebhookEventRepository;
    use crate::domain::billing::StripeEventBuilder;
    use crate::ports::HandledAs;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    // ══════════════════════════════════════════════════════════════
    // Test Infrastructure
    // ══════════════════════════════════════════════════════════════

    #[derive(Clone, Copy)]
    enum Behaviour {
        Succeed,
        Fail,
        Ignore,
    }

    struct CountingDispatcher {
        calls: AtomicU32,
        behaviour: Behaviour,
    }

    impl CountingDispatcher {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                behaviour,
            })
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn outcome(&self) -> Result<(), WebhookError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Succeed => Ok(()),
                Behaviour::Fail => Err(WebhookError::Database("Simulated failure".to_string())),
                Behaviour::Ignore => Err(WebhookError::Ignored("Test ignore".to_string())),
            }
        }
    }

    #[async_trait]
    impl WebhookDispatcher for Arc<CountingDispatcher> {
        async fn subscription_changed(
            &self,
            _event: &StripeEvent,
            _subscription: StripeSubscription,
        ) -> Result<(), WebhookError> {
            self.outcome()
        }

        async fn invoice_payment_succeeded(
            &self,
            _event: &StripeEvent,
            _invoice: StripeInvoice,
        ) -> Result<(), WebhookError> {
            self.outcome()
        }

        async fn checkout_session_completed(
            &self,
            _event: &StripeEvent,
            _session: StripeCheckoutSession,
        ) -> Result<(), WebhookError> {
            self.outcome()
        }
    }

    fn invoice_event(id: &str) -> (StripeEvent, ClassifiedEvent) {
        let event = StripeEventBuilder::new()
            .id(id)
            .event_type("invoice.payment_succeeded")
            .object(json!({"id": "in_1", "amount_paid": 500, "currency": "usd"}))
            .build();
        let classified = event.classify().unwrap();
        (event, classified)
    }

    // ══════════════════════════════════════════════════════════════
    // IdempotentWebhookProcessor Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn processor_processes_new_event_successfully() {
        let dispatcher = CountingDispatcher::new(Behaviour::Succeed);
        let processor =
            IdempotentWebhookProcessor::new(InMemoryWebhookEventRepository::new(), dispatcher.clone());

        let (event, classified) = invoice_event("evt_new");
        let result = processor.process(&event, classified).await;

        assert_eq!(result.unwrap(), WebhookResult::Processed);
        assert_eq!(dispatcher.call_count(), 1);
    }

    #[tokio::test]
    async fn processor_returns_already_processed_for_duplicate() {
        let dispatcher = CountingDispatcher::new(Behaviour::Succeed);
        let processor =
            IdempotentWebhookProcessor::new(InMemoryWebhookEventRepository::new(), dispatcher.clone());

        let (event, classified) = invoice_event("evt_dup");
        processor.process(&event, classified.clone()).await.unwrap();
        let result = processor.process(&event, classified).await;

        assert_eq!(result.unwrap(), WebhookResult::AlreadyProcessed);
        assert_eq!(dispatcher.call_count(), 1);
    }

    #[tokio::test]
    async fn failed_event_is_not_recorded_so_redelivery_runs_again() {
        let dispatcher = CountingDispatcher::new(Behaviour::Fail);
        let processor =
            IdempotentWebhookProcessor::new(InMemoryWebhookEventRepository::new(), dispatcher.clone());

        let (event, classified) = invoice_event("evt_fail");
        assert!(processor.process(&event, classified.clone()).await.is_err());
        assert!(!processor.already_processed("evt_fail").await.unwrap());

        assert!(processor.process(&event, classified).await.is_err());
        assert_eq!(dispatcher.call_count(), 2);
    }

    #[tokio::test]
    async fn ignored_outcome_counts_as_processed() {
        let dispatcher = CountingDispatcher::new(Behaviour::Ignore);
        let processor =
            IdempotentWebhookProcessor::new(InMemoryWebhookEventRepository::new(), dispatcher);

        let (event, classified) = invoice_event("evt_ignore");
        let result = processor.process(&event, classified).await;

        assert_eq!(result.unwrap(), WebhookResult::Processed);
        let record = processor
            .repository()
            .find_by_event_id("evt_ignore")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.handled_as, HandledAs::Ignored);
    }

    #[tokio::test]
    async fn unclassified_event_never_reaches_a_handler() {
        let dispatcher = CountingDispatcher::new(Behaviour::Succeed);
        let processor =
            IdempotentWebhookProcessor::new(InMemoryWebhookEventRepository::new(), dispatcher.clone());
        let event = StripeEventBuilder::new()
            .id("evt_unknown")
            .event_type("payout.paid")
            .build();

        let result = processor
            .process(&event, ClassifiedEvent::Ignored("payout.paid".into()))
            .await;

        assert_eq!(result.unwrap(), WebhookResult::Processed);
        assert_eq!(dispatcher.call_count(), 0);
    }
}
