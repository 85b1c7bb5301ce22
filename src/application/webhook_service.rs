//! StripeWebhookService - handlers for the Stripe events the membership core
//! reacts to.
//!
//! Every handler is safe to run more than once for the same event: state is
//! reconciled from the provider's snapshot and payments are keyed by invoice.
//! Events about customers that are not ours are acknowledged as ignored.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::billing::{
    CheckoutMode, PaymentMethodRef, StripeCheckoutSession, StripeCustomerObject, StripeEvent,
    StripeInvoice, StripeSubscription, WebhookDispatcher, WebhookError,
};
use crate::domain::foundation::{EventEnvelope, Timestamp};
use crate::domain::member::{
    Member, MemberChanges, MemberSelector, NewMember, PaymentEvent, RequestContext,
    SubscribeSource, SubscriptionCreated,
};
use crate::ports::{EventPublisher, SignupMailer};

use super::member_repository::MemberRepository;

pub struct StripeWebhookService {
    members: Arc<MemberRepository>,
    publisher: Arc<dyn EventPublisher>,
    mailer: Arc<dyn SignupMailer>,
}

impl StripeWebhookService {
    pub fn new(
        members: Arc<MemberRepository>,
        publisher: Arc<dyn EventPublisher>,
        mailer: Arc<dyn SignupMailer>,
    ) -> Self {
        Self {
            members,
            publisher,
            mailer,
        }
    }

    async fn member_for_customer(&self, customer_id: &str) -> Result<Option<Member>, WebhookError> {
        Ok(self
            .members
            .find(&MemberSelector::CustomerId(customer_id.to_string()))
            .await?)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Checkout: setup mode
    // ════════════════════════════════════════════════════════════════════════════

    /// Attaches the collected card and makes it the default payment method of
    /// the named subscription, or of every active subscription on the customer.
    async fn complete_setup(&self, session: &StripeCheckoutSession) -> Result<(), WebhookError> {
        let billing = self.members.billing();

        let setup_intent_id = session
            .setup_intent
            .as_deref()
            .ok_or(WebhookError::MissingField("setup_intent"))?;
        let intent = billing.get_setup_intent(setup_intent_id).await?;
        let customer_id = intent
            .metadata
            .customer_id
            .as_deref()
            .or(session.customer.as_deref())
            .ok_or(WebhookError::MissingField("metadata.customer_id"))?;
        let payment_method = intent
            .payment_method
            .as_deref()
            .ok_or(WebhookError::MissingField("payment_method"))?;

        let member = self
            .member_for_customer(customer_id)
            .await?
            .ok_or_else(|| WebhookError::MemberNotFound(customer_id.to_string()))?;

        billing
            .attach_payment_method(payment_method, customer_id)
            .await?;

        if let Some(subscription_id) = intent.metadata.subscription_id.as_deref() {
            let updated = billing
                .update_default_payment_method(subscription_id, payment_method)
                .await?;
            self.members.link_subscription(&member.id, &updated).await?;
            return Ok(());
        }

        for subscription in self.members.subscriptions(&member.id).await? {
            if !subscription.is_active() || subscription.customer_id != customer_id {
                continue;
            }
            let updated = billing
                .update_default_payment_method(&subscription.subscription_id, payment_method)
                .await?;
            self.members.link_subscription(&member.id, &updated).await?;
        }

        tracing::info!(member_id = %member.id, customer_id = %customer_id, "Payment method updated from checkout");
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Checkout: subscription mode
    // ════════════════════════════════════════════════════════════════════════════

    async fn complete_subscription_checkout(
        &self,
        session: &StripeCheckoutSession,
    ) -> Result<(), WebhookError> {
        // 1. Load the customer with its subscriptions
        let customer_id = session
            .customer
            .as_deref()
            .ok_or(WebhookError::MissingField("customer"))?;
        let customer = self.members.billing().get_customer(customer_id).await?;
        let email = customer
            .email
            .clone()
            .ok_or(WebhookError::MissingField("customer.email"))?;

        // 2. Find or create the member by billing email
        let payer_name = payer_name(&customer);
        let member = match self.members.find(&MemberSelector::Email(email.clone())).await? {
            Some(member) => self.backfill_name(member, payer_name).await?,
            None => {
                let data = NewMember {
                    name: session.metadata.name.clone().or(payer_name),
                    ..NewMember::new(email)
                };
                let ctx = RequestContext::internal().with_source(SubscribeSource::Stripe);
                self.members.create(data, &ctx).await?
            }
        };

        // 3. Link the customer and reconcile its subscriptions
        self.members.link_customer(&member.id, &customer).await?;

        // 4. Side effects that must not fail the checkout
        match session.subscription.as_deref() {
            Some(subscription_id) => {
                let event = SubscriptionCreated::new(
                    member.id,
                    subscription_id,
                    session.metadata.offer.clone(),
                );
                self.publish(&event).await;
            }
            None => {
                tracing::warn!(session_id = %session.id, "Subscription checkout without a subscription id");
            }
        }

        if !session.metadata.is_upgrade() {
            if let Err(err) = self
                .mailer
                .send_signup_email(&member, session.metadata.request_src.as_deref())
                .await
            {
                tracing::warn!(member_id = %member.id, error = %err, "Failed to send signup email");
            }
        }

        tracing::info!(member_id = %member.id, customer_id = %customer.id, "Subscription checkout completed");
        Ok(())
    }

    async fn backfill_name(
        &self,
        member: Member,
        payer_name: Option<String>,
    ) -> Result<Member, WebhookError> {
        match payer_name {
            Some(name) if member.name.is_none() => {
                let changes = MemberChanges {
                    name: Some(Some(name)),
                    ..Default::default()
                };
                Ok(self
                    .members
                    .update(&member.id, changes, &RequestContext::internal())
                    .await?)
            }
            _ => Ok(member),
        }
    }

    async fn publish(&self, event: &SubscriptionCreated) {
        let envelope = match EventEnvelope::from_event(event) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::error!(error = %err, "Failed to serialize subscription created event");
                return;
            }
        };
        if let Err(err) = self.publisher.publish(envelope).await {
            tracing::warn!(
                member_id = %event.member_id,
                subscription_id = %event.subscription_id,
                error = %err,
                "Failed to publish subscription created event"
            );
        }
    }
}

/// Cardholder name from the first subscription's expanded payment method.
fn payer_name(customer: &StripeCustomerObject) -> Option<String> {
    match &customer.subscription_snapshots().first()?.default_payment_method {
        Some(PaymentMethodRef::Expanded(method)) => method.billing_details.as_ref()?.name.clone(),
        _ => None,
    }
}

#[async_trait]
impl WebhookDispatcher for StripeWebhookService {
    async fn subscription_changed(
        &self,
        event: &StripeEvent,
        subscription: StripeSubscription,
    ) -> Result<(), WebhookError> {
        subscription.single_plan()?;

        let Some(member) = self.member_for_customer(&subscription.customer).await? else {
            return Err(WebhookError::Ignored(format!(
                "No member for customer {}",
                subscription.customer
            )));
        };

        let outcome = self.members.link_subscription(&member.id, &subscription).await?;
        tracing::debug!(
            event_id = %event.id,
            subscription_id = %subscription.id,
            action = ?outcome.action,
            "Subscription event applied"
        );
        Ok(())
    }

    async fn invoice_payment_succeeded(
        &self,
        event: &StripeEvent,
        invoice: StripeInvoice,
    ) -> Result<(), WebhookError> {
        let Some(subscription_id) = invoice.subscription.as_deref() else {
            return Err(WebhookError::Ignored("Invoice has no subscription".to_string()));
        };
        let subscription = self
            .members
            .billing()
            .get_subscription(subscription_id)
            .await?;

        let Some(member) = self.member_for_customer(&subscription.customer).await? else {
            // Only an error when the subscription is one of ours.
            let Ok(plan) = subscription.single_plan() else {
                return Err(WebhookError::Ignored(
                    "Subscription has more than one price".to_string(),
                ));
            };
            if self.members.catalog().find_by_price(&plan.id).await?.is_none() {
                return Err(WebhookError::Ignored(
                    "Subscription is for a different product".to_string(),
                ));
            }
            return Err(WebhookError::MemberNotFound(subscription.customer));
        };

        if invoice.paid && invoice.amount_paid > 0 {
            let recorded = self
                .members
                .ledger()
                .register_payment(PaymentEvent {
                    member_id: member.id,
                    invoice_id: invoice.id.clone(),
                    currency: invoice.currency.clone(),
                    amount: invoice.amount_paid,
                    created_at: Timestamp::now(),
                })
                .await?;
            tracing::info!(
                event_id = %event.id,
                member_id = %member.id,
                invoice_id = %invoice.id,
                amount = invoice.amount_paid,
                recorded,
                "Invoice payment registered"
            );
        }
        Ok(())
    }

    async fn checkout_session_completed(
        &self,
        _event: &StripeEvent,
        session: StripeCheckoutSession,
    ) -> Result<(), WebhookError> {
        match session.mode {
            CheckoutMode::Setup => self.complete_setup(&session).await,
            CheckoutMode::Subscription => self.complete_subscription_checkout(&session).await,
            CheckoutMode::Payment => Err(WebhookError::Ignored(
                "Payment checkout sessions are not handled".to_string(),
            )),
        }
    }
}
