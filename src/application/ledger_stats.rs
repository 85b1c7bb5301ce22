//! Read-side analytics over the event ledger.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::foundation::{DomainError, MemberId};
use crate::domain::member::{mrr_by_currency, SubscriberStats};
use crate::ports::EventLedger;

pub struct LedgerAnalytics {
    ledger: Arc<dyn EventLedger>,
}

impl LedgerAnalytics {
    pub fn new(ledger: Arc<dyn EventLedger>) -> Self {
        Self { ledger }
    }

    pub async fn subscriber_stats(&self, today: NaiveDate) -> Result<SubscriberStats, DomainError> {
        let events = self.ledger.subscribe_events().await?;
        Ok(SubscriberStats::from_events(&events, today))
    }

    /// Current MRR per currency across all members.
    pub async fn mrr_by_currency(&self) -> Result<BTreeMap<String, i64>, DomainError> {
        let events = self.ledger.paid_subscription_events().await?;
        Ok(mrr_by_currency(&events))
    }

    /// Current MRR per currency contributed by one member.
    pub async fn member_mrr(&self, member_id: &MemberId) -> Result<BTreeMap<String, i64>, DomainError> {
        let events = self.ledger.paid_subscription_events_for(member_id).await?;
        Ok(mrr_by_currency(&events))
    }
}
