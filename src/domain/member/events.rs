//! Outbound member notifications.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{EventId, MemberId, Timestamp};
use crate::domain_event;

/// A checkout produced a new paid subscription.
///
/// Consumed by attribution and analytics; delivery is fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionCreated {
    pub event_id: EventId,
    pub member_id: MemberId,
    pub subscription_id: String,
    pub offer_id: Option<String>,
    pub occurred_at: Timestamp,
}

impl SubscriptionCreated {
    pub fn new(
        member_id: MemberId,
        subscription_id: impl Into<String>,
        offer_id: Option<String>,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            member_id,
            subscription_id: subscription_id.into(),
            offer_id,
            occurred_at: Timestamp::now(),
        }
    }
}

domain_event!(
    SubscriptionCreated,
    event_type = "member.subscription_created.v1",
    schema_version = 1,
    aggregate_id = member_id,
    aggregate_type = "Member",
    occurred_at = occurred_at,
    event_id = event_id
);
