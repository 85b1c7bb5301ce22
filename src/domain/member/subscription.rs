//! Local subscription rows and the provider's status/interval vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::billing::{PaymentMethodRef, StripeSubscription};
use crate::domain::foundation::Timestamp;

use super::errors::MemberError;
use super::mrr::mrr_delta;

/// Subscription status as reported by Stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Unpaid,
    Canceled,
    Incomplete,
    IncompleteExpired,
}

impl SubscriptionStatus {
    /// Statuses that entitle the member to paid access.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active
                | SubscriptionStatus::Trialing
                | SubscriptionStatus::Unpaid
                | SubscriptionStatus::PastDue
        )
    }

    /// Statuses whose plan amount counts toward MRR.
    pub fn contributes_revenue(&self) -> bool {
        !matches!(
            self,
            SubscriptionStatus::Trialing
                | SubscriptionStatus::Incomplete
                | SubscriptionStatus::IncompleteExpired
                | SubscriptionStatus::Canceled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
        }
    }

    /// All known statuses, in declaration order.
    pub fn all() -> [SubscriptionStatus; 7] {
        [
            SubscriptionStatus::Active,
            SubscriptionStatus::Trialing,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Unpaid,
            SubscriptionStatus::Canceled,
            SubscriptionStatus::Incomplete,
            SubscriptionStatus::IncompleteExpired,
        ]
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubscriptionStatus::all()
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown subscription status: {}", s))
    }
}

/// Billing cadence of a plan or recurring price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanInterval {
    Day,
    Week,
    Month,
    Year,
}

impl PlanInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanInterval::Day => "day",
            PlanInterval::Week => "week",
            PlanInterval::Month => "month",
            PlanInterval::Year => "year",
        }
    }
}

impl fmt::Display for PlanInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(PlanInterval::Day),
            "week" => Ok(PlanInterval::Week),
            "month" => Ok(PlanInterval::Month),
            "year" => Ok(PlanInterval::Year),
            other => Err(format!("unknown plan interval: {}", other)),
        }
    }
}

/// The single price line of a subscription, normalized from either the
/// `price` or legacy `plan` shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSnapshot {
    pub id: String,
    pub nickname: Option<String>,
    pub interval: PlanInterval,
    pub currency: String,
    pub amount: i64,
    pub product: Option<String>,
}

/// Locally stored subscription row, unique by `subscription_id`.
///
/// Rows are upserted on every reconciliation and never deleted; a cancelled
/// subscription keeps its row with status `canceled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub subscription_id: String,
    pub customer_id: String,
    pub status: SubscriptionStatus,
    pub cancel_at_period_end: bool,
    pub cancellation_reason: Option<String>,
    pub current_period_end: Timestamp,
    pub start_date: Timestamp,
    pub plan_id: String,
    pub plan_nickname: String,
    pub plan_interval: PlanInterval,
    pub plan_amount: i64,
    pub plan_currency: String,
    pub default_payment_card_last4: Option<String>,
}

impl Subscription {
    /// Builds the row for a provider snapshot.
    ///
    /// `card_last4` is resolved by the caller because an id-only payment
    /// method needs a provider lookup.
    pub fn from_snapshot(
        snapshot: &StripeSubscription,
        card_last4: Option<String>,
    ) -> Result<Self, MemberError> {
        let plan = snapshot.single_plan()?;
        let malformed = |field: &str| MemberError::MalformedSubscriptionSnapshot {
            subscription_id: snapshot.id.clone(),
            reason: format!("{} is not a valid epoch timestamp", field),
        };

        Ok(Self {
            subscription_id: snapshot.id.clone(),
            customer_id: snapshot.customer.clone(),
            status: snapshot.status,
            cancel_at_period_end: snapshot.cancel_at_period_end,
            cancellation_reason: snapshot.metadata.get("cancellation_reason").cloned(),
            current_period_end: Timestamp::from_unix_secs(snapshot.current_period_end)
                .ok_or_else(|| malformed("current_period_end"))?,
            start_date: Timestamp::from_unix_secs(snapshot.start_date)
                .ok_or_else(|| malformed("start_date"))?,
            plan_nickname: plan
                .nickname
                .clone()
                .unwrap_or_else(|| plan.interval.to_string()),
            plan_id: plan.id,
            plan_interval: plan.interval,
            plan_amount: plan.amount,
            plan_currency: plan.currency,
            default_payment_card_last4: card_last4,
        })
    }

    /// Monthly-normalized revenue this row currently contributes.
    pub fn mrr(&self) -> i64 {
        mrr_delta(self.plan_interval, self.plan_amount, self.status)
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// True when plan or status differ, the two fields that move MRR.
    pub fn revenue_fields_differ(&self, other: &Subscription) -> bool {
        self.plan_id != other.plan_id || self.status != other.status
    }

    /// A zero-amount subscription grants paid access without billing.
    pub fn is_complimentary(&self) -> bool {
        self.plan_amount == 0
    }
}

/// Payment method id referenced by a snapshot, whichever shape it came in.
pub fn payment_method_id(reference: Option<&PaymentMethodRef>) -> Option<&str> {
    match reference? {
        PaymentMethodRef::Id(id) => Some(id.as_str()),
        PaymentMethodRef::Expanded(method) => Some(method.id.as_str()),
    }
}
