//! MemberRepository - the aggregate root for members and their billing state.
//!
//! Every write to a member, its customer links or its subscription rows goes
//! through here. Subscription writes are funnelled into `link_subscription`,
//! which serializes per subscription id, refetches the provider's current
//! state and hands it to the reconciler.

use std::sync::Arc;

use futures::future::join_all;

use crate::config::{PaymentConfig, ValidationError};
use crate::domain::billing::{BillingErrorKind, StripeCustomerObject, StripeSubscription};
use crate::domain::foundation::{DomainError, MemberId};
use crate::domain::member::{
    Member, MemberChanges, MemberError, MemberSelector, NewMember, PlanInterval, Product,
    ProductPrice, RequestContext, StatusEvent, StripeCustomer, SubscribeEvent, Subscription,
    SubscriptionStatus,
};
use crate::ports::{BillingGateway, EventLedger, MemberStore, PriceSpec, ProductCatalog};

use super::reconciler::{ReconcileOutcome, SubscriptionReconciler};
use super::status_deriver::MemberStatusDeriver;
use super::subscription_locks::SubscriptionLocks;

const COMPLIMENTARY_NICKNAME: &str = "Complimentary";

/// Billing defaults applied when a member's own subscriptions do not decide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingDefaults {
    /// Currency of complimentary prices for members without an active subscription.
    pub currency: String,
    /// Interval of newly created complimentary prices.
    pub complimentary_interval: PlanInterval,
}

impl Default for BillingDefaults {
    fn default() -> Self {
        Self {
            currency: "usd".to_string(),
            complimentary_interval: PlanInterval::Year,
        }
    }
}

impl BillingDefaults {
    pub fn from_config(config: &PaymentConfig) -> Result<Self, ValidationError> {
        Ok(Self {
            currency: config.default_currency.to_lowercase(),
            complimentary_interval: config.complimentary_interval()?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DestroyOptions {
    /// Cancel every live subscription at the provider before deleting.
    pub cancel_billing_subscriptions: bool,
}

pub struct MemberRepository {
    store: Arc<dyn MemberStore>,
    ledger: Arc<dyn EventLedger>,
    catalog: Arc<dyn ProductCatalog>,
    billing: Arc<dyn BillingGateway>,
    reconciler: SubscriptionReconciler,
    locks: SubscriptionLocks,
    defaults: BillingDefaults,
}

impl MemberRepository {
    pub fn new(
        store: Arc<dyn MemberStore>,
        ledger: Arc<dyn EventLedger>,
        catalog: Arc<dyn ProductCatalog>,
        billing: Arc<dyn BillingGateway>,
        defaults: BillingDefaults,
    ) -> Self {
        let deriver = MemberStatusDeriver::new(store.clone(), ledger.clone(), catalog.clone());
        let reconciler =
            SubscriptionReconciler::new(store.clone(), ledger.clone(), billing.clone(), deriver);
        Self {
            store,
            ledger,
            catalog,
            billing,
            reconciler,
            locks: SubscriptionLocks::new(),
            defaults,
        }
    }

    pub fn billing(&self) -> &Arc<dyn BillingGateway> {
        &self.billing
    }

    pub fn ledger(&self) -> &Arc<dyn EventLedger> {
        &self.ledger
    }

    pub fn catalog(&self) -> &Arc<dyn ProductCatalog> {
        &self.catalog
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Members
    // ════════════════════════════════════════════════════════════════════════════

    pub async fn find(&self, selector: &MemberSelector) -> Result<Option<Member>, MemberError> {
        Ok(self.store.find_member(selector).await?)
    }

    pub async fn get(&self, selector: &MemberSelector) -> Result<Member, MemberError> {
        self.find(selector)
            .await?
            .ok_or_else(|| MemberError::NotFound(selector.clone()))
    }

    pub async fn create(
        &self,
        data: NewMember,
        ctx: &RequestContext,
    ) -> Result<Member, MemberError> {
        let member = Member::create(data)?;
        self.store.insert_member(&member).await?;

        self.ledger
            .append_status_event(StatusEvent::new(member.id, None, member.status))
            .await?;
        if member.subscribed {
            self.ledger
                .append_subscribe_event(SubscribeEvent::new(
                    member.id,
                    true,
                    ctx.subscribe_source(),
                ))
                .await?;
        }

        tracing::info!(member_id = %member.id, subscribed = member.subscribed, "Member created");
        Ok(member)
    }

    /// Edits profile fields. Email changes are pushed to linked billing
    /// customers on a best-effort basis.
    pub async fn update(
        &self,
        member_id: &MemberId,
        changes: MemberChanges,
        ctx: &RequestContext,
    ) -> Result<Member, MemberError> {
        let mut member = self.get(&MemberSelector::Id(*member_id)).await?;
        let applied = member.apply(changes)?;
        self.store.update_profile(&member).await?;

        if applied.subscribed_changed {
            self.ledger
                .append_subscribe_event(SubscribeEvent::new(
                    member.id,
                    member.subscribed,
                    ctx.subscribe_source(),
                ))
                .await?;
        }
        if applied.email_changed() {
            self.propagate_email(&member).await;
        }

        Ok(member)
    }

    async fn propagate_email(&self, member: &Member) {
        let customers = match self.store.customers_for_member(&member.id).await {
            Ok(customers) => customers,
            Err(err) => {
                tracing::warn!(member_id = %member.id, error = %err, "Could not load customers for email update");
                return;
            }
        };

        let updates = customers
            .iter()
            .map(|c| self.billing.update_customer_email(&c.customer_id, &member.email));
        let results = join_all(updates).await;

        for (customer, result) in customers.into_iter().zip(results) {
            match result {
                Ok(_) => {
                    let link = StripeCustomer {
                        email: Some(member.email.clone()),
                        ..customer
                    };
                    if let Err(err) = self.store.upsert_customer(&link).await {
                        tracing::warn!(customer_id = %link.customer_id, error = %err, "Failed to store customer email");
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        member_id = %member.id,
                        customer_id = %customer.customer_id,
                        error = %err,
                        "Failed to update billing customer email"
                    );
                }
            }
        }
    }

    /// Deletes the member, optionally cancelling its live subscriptions first.
    pub async fn destroy(
        &self,
        member_id: &MemberId,
        options: DestroyOptions,
    ) -> Result<(), MemberError> {
        let member = self.get(&MemberSelector::Id(*member_id)).await?;

        if options.cancel_billing_subscriptions {
            let subscriptions = self.store.subscriptions_for_member(&member.id).await?;
            for subscription in subscriptions
                .iter()
                .filter(|s| s.status != SubscriptionStatus::Canceled)
            {
                let canceled = self
                    .billing
                    .cancel_subscription(&subscription.subscription_id)
                    .await?;
                self.link_subscription(&member.id, &canceled).await?;
            }
        }

        self.store.delete_member(&member.id).await?;
        tracing::info!(member_id = %member.id, "Member deleted");
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Customers & Subscriptions
    // ════════════════════════════════════════════════════════════════════════════

    /// Records the customer as belonging to the member.
    pub async fn upsert_customer(
        &self,
        member_id: &MemberId,
        customer: &StripeCustomerObject,
    ) -> Result<StripeCustomer, MemberError> {
        let member = self.get(&MemberSelector::Id(*member_id)).await?;

        if let Some(existing) = self.store.find_customer(&customer.id).await? {
            if existing.member_id != member.id {
                return Err(MemberError::CustomerAlreadyLinked {
                    customer_id: customer.id.clone(),
                });
            }
        }

        let link = StripeCustomer {
            customer_id: customer.id.clone(),
            member_id: member.id,
            name: customer.name.clone(),
            email: customer.email.clone(),
        };
        self.store.upsert_customer(&link).await?;
        Ok(link)
    }

    /// Links the customer and reconciles every subscription embedded in it.
    pub async fn link_customer(
        &self,
        member_id: &MemberId,
        customer: &StripeCustomerObject,
    ) -> Result<Vec<ReconcileOutcome>, MemberError> {
        self.upsert_customer(member_id, customer).await?;

        let mut outcomes = Vec::new();
        for snapshot in customer.subscription_snapshots() {
            outcomes.push(self.link_subscription(member_id, snapshot).await?);
        }
        Ok(outcomes)
    }

    /// Reconciles a subscription of one of the member's customers.
    ///
    /// The snapshot only identifies the subscription; the state applied is
    /// the provider's at the time the lock is held.
    pub async fn link_subscription(
        &self,
        member_id: &MemberId,
        snapshot: &StripeSubscription,
    ) -> Result<ReconcileOutcome, MemberError> {
        let _guard = self.locks.lock(&snapshot.id).await;

        // 1. The customer must belong to this member
        let linked = self
            .store
            .find_customer(&snapshot.customer)
            .await?
            .is_some_and(|c| c.member_id == *member_id);
        if !linked {
            return Err(MemberError::NotLinked {
                subscription_id: snapshot.id.clone(),
                customer_id: snapshot.customer.clone(),
            });
        }

        // 2. Latest provider state
        let latest = match self.billing.get_subscription(&snapshot.id).await {
            Ok(latest) => latest,
            Err(err) if err.is(BillingErrorKind::ResourceMissing) => {
                tracing::warn!(subscription_id = %snapshot.id, "Subscription missing at provider, using snapshot");
                snapshot.clone()
            }
            Err(err) => return Err(err.into()),
        };

        // 3. Make sure the catalog knows the price
        self.associate_price(&latest).await;

        // 4. Reconcile
        self.reconciler.reconcile(member_id, &latest).await
    }

    /// Registers an unknown subscription price on the product it belongs to
    /// at the provider, or on the default product when that is not ours.
    async fn associate_price(&self, subscription: &StripeSubscription) {
        let Ok(plan) = subscription.single_plan() else {
            return;
        };

        let result: Result<(), DomainError> = async {
            if self.catalog.find_by_price(&plan.id).await?.is_some() {
                return Ok(());
            }
            let owner = match &plan.product {
                Some(stripe_product_id) => {
                    self.catalog.find_by_stripe_product(stripe_product_id).await?
                }
                None => None,
            };
            let product = match owner {
                Some(product) => Some(product),
                None => self.catalog.default_product().await?,
            };
            let Some(product) = product else {
                tracing::error!(subscription_id = %subscription.id, "No products exist to link the price to");
                return Ok(());
            };
            self.catalog
                .add_price(
                    &product.id,
                    ProductPrice {
                        stripe_price_id: plan.id.clone(),
                        currency: plan.currency.clone(),
                        amount: plan.amount,
                        interval: plan.interval,
                        nickname: plan.nickname.clone(),
                        active: true,
                    },
                )
                .await
        }
        .await;

        if let Err(err) = result {
            tracing::error!(subscription_id = %subscription.id, error = %err, "Failed to link price to product");
        }
    }

    pub async fn subscriptions(&self, member_id: &MemberId) -> Result<Vec<Subscription>, MemberError> {
        Ok(self.store.subscriptions_for_member(member_id).await?)
    }

    /// A subscription row owned by the member.
    pub async fn get_subscription(
        &self,
        member_id: &MemberId,
        subscription_id: &str,
    ) -> Result<Subscription, MemberError> {
        let not_found = || MemberError::SubscriptionNotFound(subscription_id.to_string());
        let row = self
            .store
            .find_subscription(subscription_id)
            .await?
            .ok_or_else(not_found)?;

        let owned = self
            .store
            .find_customer(&row.customer_id)
            .await?
            .is_some_and(|c| c.member_id == *member_id);
        if !owned {
            return Err(not_found());
        }
        Ok(row)
    }

    /// Cancels immediately at the provider, then reconciles.
    pub async fn cancel_subscription(
        &self,
        member_id: &MemberId,
        subscription_id: &str,
    ) -> Result<ReconcileOutcome, MemberError> {
        let row = self.get_subscription(member_id, subscription_id).await?;
        let updated = self.billing.cancel_subscription(&row.subscription_id).await?;
        self.link_subscription(member_id, &updated).await
    }

    pub async fn set_cancel_at_period_end(
        &self,
        member_id: &MemberId,
        subscription_id: &str,
        cancel: bool,
        reason: Option<&str>,
    ) -> Result<ReconcileOutcome, MemberError> {
        let row = self.get_subscription(member_id, subscription_id).await?;
        let updated = self
            .billing
            .set_cancel_at_period_end(&row.subscription_id, cancel, reason)
            .await?;
        self.link_subscription(member_id, &updated).await
    }

    pub async fn change_subscription_price(
        &self,
        member_id: &MemberId,
        subscription_id: &str,
        price_id: &str,
    ) -> Result<ReconcileOutcome, MemberError> {
        let row = self.get_subscription(member_id, subscription_id).await?;
        let updated = self.billing.change_plan(&row.subscription_id, price_id).await?;
        self.link_subscription(member_id, &updated).await
    }

    /// Subscribes the member to `price_id`, reusing a live customer when one
    /// exists.
    pub async fn create_subscription(
        &self,
        member_id: &MemberId,
        price_id: &str,
    ) -> Result<ReconcileOutcome, MemberError> {
        let member = self.get(&MemberSelector::Id(*member_id)).await?;
        let customer = self.live_customer(&member).await?;
        let created = self.billing.create_subscription(&customer.id, price_id).await?;
        self.link_subscription(&member.id, &created).await
    }

    async fn live_customer(&self, member: &Member) -> Result<StripeCustomerObject, MemberError> {
        for link in self.store.customers_for_member(&member.id).await? {
            match self.billing.get_customer(&link.customer_id).await {
                Ok(customer) if !customer.deleted => return Ok(customer),
                Ok(_) => continue,
                Err(err) if err.is(BillingErrorKind::ResourceMissing) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        let customer = self
            .billing
            .create_customer(&member.email, member.name.as_deref())
            .await?;
        self.upsert_customer(&member.id, &customer).await?;
        tracing::info!(member_id = %member.id, customer_id = %customer.id, "Billing customer created");
        Ok(customer)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Complimentary Access
    // ════════════════════════════════════════════════════════════════════════════

    /// Moves the member onto a zero-amount price of the default product.
    ///
    /// Active subscriptions are switched in their own currency; a member
    /// without one gets a new subscription in the default currency.
    pub async fn set_complimentary_subscription(
        &self,
        member_id: &MemberId,
    ) -> Result<Vec<ReconcileOutcome>, MemberError> {
        let member = self.get(&MemberSelector::Id(*member_id)).await?;
        let product = self
            .catalog
            .default_product()
            .await?
            .ok_or(MemberError::MissingDefaultProduct)?;

        let active: Vec<Subscription> = self
            .store
            .subscriptions_for_member(&member.id)
            .await?
            .into_iter()
            .filter(Subscription::is_active)
            .collect();

        if active.is_empty() {
            let price_id = self
                .complimentary_price(&product, &self.defaults.currency)
                .await?;
            return Ok(vec![self.create_subscription(&member.id, &price_id).await?]);
        }

        let mut outcomes = Vec::with_capacity(active.len());
        for subscription in active {
            let price_id = self
                .complimentary_price(&product, &subscription.plan_currency)
                .await?;
            if subscription.plan_id == price_id {
                continue;
            }
            let updated = self
                .billing
                .change_plan(&subscription.subscription_id, &price_id)
                .await?;
            outcomes.push(self.link_subscription(&member.id, &updated).await?);
        }
        Ok(outcomes)
    }

    async fn complimentary_price(
        &self,
        product: &Product,
        currency: &str,
    ) -> Result<String, MemberError> {
        if let Some(price) = product.complimentary_price(currency) {
            return Ok(price.stripe_price_id.clone());
        }

        let spec = PriceSpec {
            product_id: product.stripe_product_id.clone(),
            interval: self.defaults.complimentary_interval,
            currency: currency.to_lowercase(),
            amount: 0,
            nickname: Some(COMPLIMENTARY_NICKNAME.to_string()),
        };
        let price = self.billing.ensure_price(&spec).await?;
        self.catalog
            .add_price(
                &product.id,
                ProductPrice {
                    stripe_price_id: price.id.clone(),
                    currency: spec.currency.clone(),
                    amount: 0,
                    interval: spec.interval,
                    nickname: spec.nickname.clone(),
                    active: true,
                },
            )
            .await?;

        tracing::info!(product_id = %product.id, price_id = %price.id, currency = %spec.currency, "Complimentary price created");
        Ok(price.id)
    }

    /// Cancels the member's live zero-amount subscriptions. Failures are
    /// logged and skipped; returns how many were cancelled.
    pub async fn cancel_complimentary_subscription(
        &self,
        member_id: &MemberId,
    ) -> Result<usize, MemberError> {
        let member = self.get(&MemberSelector::Id(*member_id)).await?;
        let subscriptions = self.store.subscriptions_for_member(&member.id).await?;

        let mut cancelled = 0;
        for subscription in subscriptions
            .iter()
            .filter(|s| s.status != SubscriptionStatus::Canceled && s.is_complimentary())
        {
            match self
                .cancel_subscription(&member.id, &subscription.subscription_id)
                .await
            {
                Ok(_) => cancelled += 1,
                Err(err) => {
                    tracing::error!(
                        member_id = %member.id,
                        subscription_id = %subscription.subscription_id,
                        error = %err,
                        "Failed to cancel complimentary subscription"
                    );
                }
            }
        }
        Ok(cancelled)
    }
}
