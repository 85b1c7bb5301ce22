//! Append-only ledger records and the aggregates rebuilt from them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::foundation::{MemberId, Timestamp};

use super::aggregate::MemberStatus;

/// Origin of a newsletter subscribe/unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscribeSource {
    System,
    Admin,
    Member,
    Stripe,
    Api,
    Import,
}

impl fmt::Display for SubscribeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubscribeSource::System => "system",
            SubscribeSource::Admin => "admin",
            SubscribeSource::Member => "member",
            SubscribeSource::Stripe => "stripe",
            SubscribeSource::Api => "api",
            SubscribeSource::Import => "import",
        };
        f.write_str(s)
    }
}

/// Observed member tier transition. `from_status` is `None` for the
/// creation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub member_id: MemberId,
    pub from_status: Option<MemberStatus>,
    pub to_status: MemberStatus,
    pub created_at: Timestamp,
}

impl StatusEvent {
    pub fn new(member_id: MemberId, from: Option<MemberStatus>, to: MemberStatus) -> Self {
        Self {
            member_id,
            from_status: from,
            to_status: to,
            created_at: Timestamp::now(),
        }
    }
}

/// Newsletter opt-in or opt-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeEvent {
    pub member_id: MemberId,
    pub subscribed: bool,
    pub source: SubscribeSource,
    pub created_at: Timestamp,
}

impl SubscribeEvent {
    pub fn new(member_id: MemberId, subscribed: bool, source: SubscribeSource) -> Self {
        Self {
            member_id,
            subscribed,
            source,
            created_at: Timestamp::now(),
        }
    }
}

/// Signed MRR change caused by a subscription create or plan/status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaidSubscriptionEvent {
    pub member_id: MemberId,
    pub subscription_id: String,
    pub from_plan: Option<String>,
    pub to_plan: String,
    pub currency: String,
    pub mrr_delta: i64,
    pub created_at: Timestamp,
}

/// A successful invoice payment, unique by invoice id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub member_id: MemberId,
    pub invoice_id: String,
    pub currency: String,
    pub amount: i64,
    pub created_at: Timestamp,
}

/// Running newsletter-subscriber count at the end of one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubscriberCount {
    pub date: NaiveDate,
    pub subscribed: i64,
}

/// Newsletter subscriber totals rebuilt from subscribe events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriberStats {
    pub total: i64,
    pub total_on_date: Vec<SubscriberCount>,
    pub new_today: i64,
}

impl SubscriberStats {
    /// Folds subscribe events into a cumulative per-day series.
    pub fn from_events(events: &[SubscribeEvent], today: NaiveDate) -> Self {
        let mut deltas: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for event in events {
            let delta = if event.subscribed { 1 } else { -1 };
            *deltas.entry(event.created_at.date()).or_insert(0) += delta;
        }

        let mut running = 0;
        let total_on_date: Vec<SubscriberCount> = deltas
            .iter()
            .map(|(date, delta)| {
                running += delta;
                SubscriberCount {
                    date: *date,
                    subscribed: running,
                }
            })
            .collect();

        let new_today = match deltas.iter().next_back() {
            Some((date, delta)) if *date == today => *delta,
            _ => 0,
        };

        Self {
            total: running,
            total_on_date,
            new_today,
        }
    }
}

/// Current MRR per currency: the running sum of every recorded delta.
pub fn mrr_by_currency(events: &[PaidSubscriptionEvent]) -> BTreeMap<String, i64> {
    let mut totals = BTreeMap::new();
    for event in events {
        *totals.entry(event.currency.clone()).or_insert(0) += event.mrr_delta;
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscribe_on(day: i64, subscribed: bool) -> SubscribeEvent {
        let base = Timestamp::from_unix_secs(1_704_067_200).unwrap();
        SubscribeEvent {
            member_id: MemberId::new(),
            subscribed,
            source: SubscribeSource::Member,
            created_at: base.add_days(day),
        }
    }

    fn paid(currency: &str, delta: i64) -> PaidSubscriptionEvent {
        PaidSubscriptionEvent {
            member_id: MemberId::new(),
            subscription_id: "sub_1".into(),
            from_plan: None,
            to_plan: "price_1".into(),
            currency: currency.into(),
            mrr_delta: delta,
            created_at: Timestamp::now(),
        }
    }

    #[test]
    fn subscriber_stats_are_cumulative_per_day() {
        let events = vec![
            subscribe_on(0, true),
            subscribe_on(0, true),
            subscribe_on(1, false),
            subscribe_on(3, true),
        ];
        let today = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();

        let stats = SubscriberStats::from_events(&events, today);

        let series: Vec<i64> = stats.total_on_date.iter().map(|c| c.subscribed).collect();
        assert_eq!(series, vec![2, 1, 2]);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.new_today, 1);
    }

    #[test]
    fn new_today_is_zero_when_last_entry_is_older() {
        let events = vec![subscribe_on(0, true)];
        let today = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();

        let stats = SubscriberStats::from_events(&events, today);

        assert_eq!(stats.total, 1);
        assert_eq!(stats.new_today, 0);
    }

    #[test]
    fn empty_ledger_has_no_subscribers() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let stats = SubscriberStats::from_events(&[], today);
        assert_eq!(stats.total, 0);
        assert!(stats.total_on_date.is_empty());
    }

    #[test]
    fn mrr_by_currency_sums_signed_deltas() {
        let events = vec![paid("usd", 500), paid("eur", 416), paid("usd", -500), paid("usd", 100)];

        let totals = mrr_by_currency(&events);

        assert_eq!(totals.get("usd"), Some(&100));
        assert_eq!(totals.get("eur"), Some(&416));
    }
}
