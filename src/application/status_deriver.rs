//! MemberStatusDeriver - keeps a member's tier and products in step with
//! its subscriptions.

use std::sync::Arc;

use crate::domain::foundation::{MemberId, Timestamp};
use crate::domain::member::{
    active_plan_ids, transition, Member, MemberError, MemberSelector, MemberStatus, StatusEvent,
    StatusTransition, Subscription,
};
use crate::ports::{EventLedger, MemberStore, ProductCatalog};

/// Outcome of a derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedStatus {
    pub status: MemberStatus,
    /// Set when the stored tier changed and a status event was appended.
    pub transition: Option<StatusTransition>,
    pub products: Vec<String>,
}

/// Derives tier and products from a subscription set and persists changes.
///
/// Running it again over the same set writes nothing.
pub struct MemberStatusDeriver {
    store: Arc<dyn MemberStore>,
    ledger: Arc<dyn EventLedger>,
    catalog: Arc<dyn ProductCatalog>,
}

impl MemberStatusDeriver {
    pub fn new(
        store: Arc<dyn MemberStore>,
        ledger: Arc<dyn EventLedger>,
        catalog: Arc<dyn ProductCatalog>,
    ) -> Self {
        Self {
            store,
            ledger,
            catalog,
        }
    }

    /// Derives from the member's stored subscriptions.
    pub async fn refresh(&self, member_id: &MemberId) -> Result<DerivedStatus, MemberError> {
        let subscriptions = self.store.subscriptions_for_member(member_id).await?;
        self.derive_status(member_id, &subscriptions).await
    }

    pub async fn derive_status(
        &self,
        member_id: &MemberId,
        subscriptions: &[Subscription],
    ) -> Result<DerivedStatus, MemberError> {
        let selector = MemberSelector::Id(*member_id);
        let mut member = self
            .store
            .find_member(&selector)
            .await?
            .ok_or(MemberError::NotFound(selector))?;

        self.apply(&mut member, subscriptions).await
    }

    async fn apply(
        &self,
        member: &mut Member,
        subscriptions: &[Subscription],
    ) -> Result<DerivedStatus, MemberError> {
        let change = transition(member.status, subscriptions);
        let products = self.products_for(subscriptions).await?;

        if change.is_none() && products == member.products {
            return Ok(DerivedStatus {
                status: member.status,
                transition: None,
                products,
            });
        }

        if let Some(change) = change {
            member.status = change.to;
        }
        member.products = products.clone();
        member.updated_at = Timestamp::now();
        self.store
            .update_status(&member.id, member.status, &member.products, member.updated_at)
            .await?;

        if let Some(change) = change {
            self.ledger
                .append_status_event(StatusEvent::new(member.id, Some(change.from), change.to))
                .await?;
            tracing::info!(
                member_id = %member.id,
                from = %change.from,
                to = %change.to,
                "Member status changed"
            );
        }

        Ok(DerivedStatus {
            status: member.status,
            transition: change,
            products,
        })
    }

    /// Catalog products granted by active subscriptions, first-seen order.
    async fn products_for(&self, subscriptions: &[Subscription]) -> Result<Vec<String>, MemberError> {
        let mut products: Vec<String> = Vec::new();
        for plan_id in active_plan_ids(subscriptions) {
            if let Some(product) = self.catalog.find_by_price(plan_id).await? {
                if !products.contains(&product.id) {
                    products.push(product.id);
                }
            }
        }
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryEventLedger, InMemoryMemberStore, InMemoryProductCatalog};
    use crate::domain::member::{
        NewMember, PlanInterval, Product, ProductPrice, StripeCustomer, SubscriptionStatus,
    };

    // ══════════════════════════════════════════════════════════════
    // Test Infrastructure
    // ══════════════════════════════════════════════════════════════

    struct Fixture {
        store: Arc<InMemoryMemberStore>,
        ledger: Arc<InMemoryEventLedger>,
        deriver: MemberStatusDeriver,
        member: Member,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryMemberStore::new());
        let ledger = Arc::new(InMemoryEventLedger::new());
        let catalog = Arc::new(InMemoryProductCatalog::with_products(vec![Product {
            id: "product_gold".into(),
            name: "Gold".into(),
            stripe_product_id: "prod_gold".into(),
            prices: vec![ProductPrice {
                stripe_price_id: "price_gold".into(),
                currency: "usd".into(),
                amount: 500,
                interval: PlanInterval::Month,
                nickname: None,
                active: true,
            }],
        }]));

        let member = Member::create(NewMember::new("ada@example.com")).unwrap();
        store.insert_member(&member).await.unwrap();
        store
            .upsert_customer(&StripeCustomer {
                customer_id: "cus_1".into(),
                member_id: member.id,
                name: None,
                email: Some(member.email.clone()),
            })
            .await
            .unwrap();

        let deriver = MemberStatusDeriver::new(store.clone(), ledger.clone(), catalog);
        Fixture {
            store,
            ledger,
            deriver,
            member,
        }
    }

    fn sub(id: &str, plan: &str, status: SubscriptionStatus) -> Subscription {
        Subscription {
            subscription_id: id.into(),
            customer_id: "cus_1".into(),
            status,
            cancel_at_period_end: false,
            cancellation_reason: None,
            current_period_end: Timestamp::now(),
            start_date: Timestamp::now(),
            plan_id: plan.into(),
            plan_nickname: "Monthly".into(),
            plan_interval: PlanInterval::Month,
            plan_amount: 500,
            plan_currency: "usd".into(),
            default_payment_card_last4: None,
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Derivation Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn active_subscription_upgrades_and_records_once() {
        let f = fixture().await;
        let subs = vec![sub("sub_1", "price_gold", SubscriptionStatus::Active)];

        let first = f.deriver.derive_status(&f.member.id, &subs).await.unwrap();
        let second = f.deriver.derive_status(&f.member.id, &subs).await.unwrap();

        assert_eq!(
            first.transition,
            Some(StatusTransition {
                from: MemberStatus::Free,
                to: MemberStatus::Paid
            })
        );
        assert_eq!(second.transition, None);
        assert_eq!(second.status, MemberStatus::Paid);
        assert_eq!(f.ledger.status_event_count().await, 1);
    }

    #[tokio::test]
    async fn products_follow_active_prices() {
        let f = fixture().await;
        let subs = vec![
            sub("sub_1", "price_gold", SubscriptionStatus::Active),
            sub("sub_2", "price_unknown", SubscriptionStatus::Active),
        ];

        f.deriver.derive_status(&f.member.id, &subs).await.unwrap();

        let stored = f
            .store
            .find_member(&MemberSelector::Id(f.member.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.products, vec!["product_gold".to_string()]);
    }

    #[tokio::test]
    async fn losing_last_active_subscription_downgrades() {
        let f = fixture().await;
        let active = vec![sub("sub_1", "price_gold", SubscriptionStatus::Active)];
        let canceled = vec![sub("sub_1", "price_gold", SubscriptionStatus::Canceled)];

        f.deriver.derive_status(&f.member.id, &active).await.unwrap();
        let derived = f.deriver.derive_status(&f.member.id, &canceled).await.unwrap();

        assert_eq!(derived.status, MemberStatus::Free);
        assert!(derived.products.is_empty());
        let events = f.ledger.status_events_for(&f.member.id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].from_status, Some(MemberStatus::Paid));
        assert_eq!(events[1].to_status, MemberStatus::Free);
    }

    #[tokio::test]
    async fn refresh_reads_stored_subscriptions() {
        let f = fixture().await;
        f.store
            .insert_subscription(&sub("sub_1", "price_gold", SubscriptionStatus::PastDue))
            .await
            .unwrap();

        let derived = f.deriver.refresh(&f.member.id).await.unwrap();

        assert_eq!(derived.status, MemberStatus::Paid);
    }

    #[tokio::test]
    async fn unknown_member_is_not_found() {
        let f = fixture().await;
        let result = f.deriver.derive_status(&MemberId::new(), &[]).await;
        assert!(matches!(result, Err(MemberError::NotFound(_))));
    }
}
