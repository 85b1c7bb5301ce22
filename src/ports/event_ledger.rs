//! EventLedger port - append-only store of member history.
//!
//! Entries are immutable once written and read back in creation order.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, MemberId};
use crate::domain::member::{PaidSubscriptionEvent, PaymentEvent, StatusEvent, SubscribeEvent};

#[async_trait]
pub trait EventLedger: Send + Sync {
    async fn append_status_event(&self, event: StatusEvent) -> Result<(), DomainError>;

    async fn append_subscribe_event(&self, event: SubscribeEvent) -> Result<(), DomainError>;

    async fn append_paid_subscription_event(
        &self,
        event: PaidSubscriptionEvent,
    ) -> Result<(), DomainError>;

    /// Records a payment once per invoice id. Returns `false` when the
    /// invoice was already registered.
    async fn register_payment(&self, event: PaymentEvent) -> Result<bool, DomainError>;

    async fn status_events_for(&self, member_id: &MemberId) -> Result<Vec<StatusEvent>, DomainError>;

    async fn subscribe_events(&self) -> Result<Vec<SubscribeEvent>, DomainError>;

    async fn paid_subscription_events(&self) -> Result<Vec<PaidSubscriptionEvent>, DomainError>;

    async fn paid_subscription_events_for(
        &self,
        member_id: &MemberId,
    ) -> Result<Vec<PaidSubscriptionEvent>, DomainError>;

    async fn payments_for(&self, member_id: &MemberId) -> Result<Vec<PaymentEvent>, DomainError>;
}
