//! SubscriptionReconciler - merges a provider subscription snapshot into
//! local storage and the revenue ledger.
//!
//! The stored row is compared against the full snapshot rather than patched,
//! so replaying a snapshot is a zero-delta no-op and any serial order of
//! deliveries converges on the provider's final state. Callers must hold the
//! subscription's lock (see `SubscriptionLocks`).

use std::sync::Arc;

use crate::domain::billing::{PaymentMethodRef, StripeSubscription};
use crate::domain::foundation::{MemberId, Timestamp};
use crate::domain::member::{MemberError, PaidSubscriptionEvent, Subscription};
use crate::ports::{BillingGateway, EventLedger, MemberStore};

use super::status_deriver::{DerivedStatus, MemberStatusDeriver};

/// What reconciliation did to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Created,
    /// Plan or status moved; a ledger entry was appended.
    Updated,
    /// Only non-revenue fields (if any) changed.
    Refreshed,
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub subscription: Subscription,
    pub action: ReconcileAction,
    /// Delta appended to the ledger, if any.
    pub mrr_delta: Option<i64>,
    pub status: DerivedStatus,
}

pub struct SubscriptionReconciler {
    store: Arc<dyn MemberStore>,
    ledger: Arc<dyn EventLedger>,
    billing: Arc<dyn BillingGateway>,
    deriver: MemberStatusDeriver,
}

impl SubscriptionReconciler {
    pub fn new(
        store: Arc<dyn MemberStore>,
        ledger: Arc<dyn EventLedger>,
        billing: Arc<dyn BillingGateway>,
        deriver: MemberStatusDeriver,
    ) -> Self {
        Self {
            store,
            ledger,
            billing,
            deriver,
        }
    }

    pub fn deriver(&self) -> &MemberStatusDeriver {
        &self.deriver
    }

    pub async fn reconcile(
        &self,
        member_id: &MemberId,
        snapshot: &StripeSubscription,
    ) -> Result<ReconcileOutcome, MemberError> {
        // 1. Reject malformed snapshots before touching anything
        if let Err(err) = snapshot.single_plan() {
            tracing::error!(
                member_id = %member_id,
                subscription_id = %snapshot.id,
                error = %err,
                "Malformed subscription snapshot"
            );
            return Err(err);
        }

        // 2. Build the row
        let card_last4 = self.card_last4(snapshot).await?;
        let row = Subscription::from_snapshot(snapshot, card_last4)?;

        // 3. Create or update against the stored row
        let (action, mrr_delta) = match self.store.find_subscription(&row.subscription_id).await? {
            None => {
                self.store.insert_subscription(&row).await?;
                let delta = row.mrr();
                self.append_delta(member_id, None, &row, delta).await?;
                (ReconcileAction::Created, Some(delta))
            }
            Some(stored) if stored.revenue_fields_differ(&row) => {
                let delta = row.mrr().saturating_sub(stored.mrr());
                self.store.update_subscription(&row).await?;
                self.append_delta(member_id, Some(stored.plan_id), &row, delta)
                    .await?;
                (ReconcileAction::Updated, Some(delta))
            }
            Some(_) => {
                self.store.update_subscription(&row).await?;
                (ReconcileAction::Refreshed, None)
            }
        };

        tracing::info!(
            member_id = %member_id,
            subscription_id = %row.subscription_id,
            status = %row.status,
            action = ?action,
            mrr_delta = mrr_delta.unwrap_or(0),
            "Subscription reconciled"
        );

        // 4. Re-derive the owning member
        let status = self.deriver.refresh(member_id).await?;

        Ok(ReconcileOutcome {
            subscription: row,
            action,
            mrr_delta,
            status,
        })
    }

    async fn card_last4(&self, snapshot: &StripeSubscription) -> Result<Option<String>, MemberError> {
        match &snapshot.default_payment_method {
            None => Ok(None),
            Some(PaymentMethodRef::Expanded(method)) => Ok(method.card_last4()),
            Some(PaymentMethodRef::Id(id)) => {
                let method = self.billing.get_payment_method(id).await?;
                Ok(method.card_last4())
            }
        }
    }

    async fn append_delta(
        &self,
        member_id: &MemberId,
        from_plan: Option<String>,
        row: &Subscription,
        mrr_delta: i64,
    ) -> Result<(), MemberError> {
        self.ledger
            .append_paid_subscription_event(PaidSubscriptionEvent {
                member_id: *member_id,
                subscription_id: row.subscription_id.clone(),
                from_plan,
                to_plan: row.plan_id.clone(),
                currency: row.plan_currency.clone(),
                mrr_delta,
                created_at: Timestamp::now(),
            })
            .await?;
        Ok(())
    }
}
