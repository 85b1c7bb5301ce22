//! In-memory event ledger.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, MemberId};
use crate::domain::member::{PaidSubscriptionEvent, PaymentEvent, StatusEvent, SubscribeEvent};
use crate::ports::EventLedger;

#[derive(Debug, Default)]
struct Entries {
    status: Vec<StatusEvent>,
    subscribe: Vec<SubscribeEvent>,
    paid: Vec<PaidSubscriptionEvent>,
    payments: Vec<PaymentEvent>,
}

/// Append-only vectors, one per event kind, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventLedger {
    entries: Arc<RwLock<Entries>>,
}

impl InMemoryEventLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn status_event_count(&self) -> usize {
        self.entries.read().await.status.len()
    }

    pub async fn paid_event_count(&self) -> usize {
        self.entries.read().await.paid.len()
    }
}

#[async_trait]
impl EventLedger for InMemoryEventLedger {
    async fn append_status_event(&self, event: StatusEvent) -> Result<(), DomainError> {
        self.entries.write().await.status.push(event);
        Ok(())
    }

    async fn append_subscribe_event(&self, event: SubscribeEvent) -> Result<(), DomainError> {
        self.entries.write().await.subscribe.push(event);
        Ok(())
    }

    async fn append_paid_subscription_event(
        &self,
        event: PaidSubscriptionEvent,
    ) -> Result<(), DomainError> {
        self.entries.write().await.paid.push(event);
        Ok(())
    }

    async fn register_payment(&self, event: PaymentEvent) -> Result<bool, DomainError> {
        let mut entries = self.entries.write().await;
        if entries.payments.iter().any(|p| p.invoice_id == event.invoice_id) {
            return Ok(false);
        }
        entries.payments.push(event);
        Ok(true)
    }

    async fn status_events_for(&self, member_id: &MemberId) -> Result<Vec<StatusEvent>, DomainError> {
        let entries = self.entries.read().await;
        Ok(entries
            .status
            .iter()
            .filter(|e| e.member_id == *member_id)
            .cloned()
            .collect())
    }

    async fn subscribe_events(&self) -> Result<Vec<SubscribeEvent>, DomainError> {
        Ok(self.entries.read().await.subscribe.clone())
    }

    async fn paid_subscription_events(&self) -> Result<Vec<PaidSubscriptionEvent>, DomainError> {
        Ok(self.entries.read().await.paid.clone())
    }

    async fn paid_subscription_events_for(
        &self,
        member_id: &MemberId,
    ) -> Result<Vec<PaidSubscriptionEvent>, DomainError> {
        let entries = self.entries.read().await;
        Ok(entries
            .paid
            .iter()
            .filter(|e| e.member_id == *member_id)
            .cloned()
            .collect())
    }

    async fn payments_for(&self, member_id: &MemberId) -> Result<Vec<PaymentEvent>, DomainError> {
        let entries = self.entries.read().await;
        Ok(entries
            .payments
            .iter()
            .filter(|e| e.member_id == *member_id)
            .cloned()
            .collect())
    }
}
