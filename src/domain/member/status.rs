//! Pure member-tier derivation from a subscription set.

use super::aggregate::MemberStatus;
use super::subscription::Subscription;

/// Tier implied by a member's subscriptions: `Paid` when any is active-status.
///
/// Zero-amount subscriptions are complimentary access and still derive
/// `Paid`. A stored legacy `Comped` never results from derivation.
pub fn derive_tier(subscriptions: &[Subscription]) -> MemberStatus {
    if subscriptions.iter().any(Subscription::is_active) {
        MemberStatus::Paid
    } else {
        MemberStatus::Free
    }
}

/// Plan ids of active subscriptions, deduplicated, in first-seen order.
pub fn active_plan_ids(subscriptions: &[Subscription]) -> Vec<&str> {
    let mut ids: Vec<&str> = Vec::new();
    for sub in subscriptions.iter().filter(|s| s.is_active()) {
        if !ids.contains(&sub.plan_id.as_str()) {
            ids.push(sub.plan_id.as_str());
        }
    }
    ids
}

/// A tier change the deriver must persist and record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub from: MemberStatus,
    pub to: MemberStatus,
}

/// Returns the transition from `current`, or `None` when already in sync.
pub fn transition(current: MemberStatus, subscriptions: &[Subscription]) -> Option<StatusTransition> {
    let to = derive_tier(subscriptions);
    (to != current).then_some(StatusTransition { from: current, to })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use crate::domain::member::{PlanInterval, SubscriptionStatus};
    use proptest::prelude::*;

    fn sub(id: &str, plan: &str, status: SubscriptionStatus, amount: i64) -> Subscription {
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
            plan_amount: amount,
            plan_currency: "usd".into(),
            default_payment_card_last4: None,
        }
    }

    #[test]
    fn no_subscriptions_is_free() {
        assert_eq!(derive_tier(&[]), MemberStatus::Free);
    }

    #[test]
    fn any_active_status_is_paid() {
        for status in [
            SubscriptionStatus::Active,
            SubscriptionStatus::Trialing,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Unpaid,
        ] {
            assert_eq!(derive_tier(&[sub("sub_1", "price_1", status, 500)]), MemberStatus::Paid);
        }
    }

    #[test]
    fn only_canceled_or_incomplete_is_free() {
        let subs = vec![
            sub("sub_1", "price_1", SubscriptionStatus::Canceled, 500),
            sub("sub_2", "price_1", SubscriptionStatus::IncompleteExpired, 500),
        ];
        assert_eq!(derive_tier(&subs), MemberStatus::Free);
    }

    #[test]
    fn zero_amount_subscription_derives_paid() {
        let subs = vec![sub("sub_1", "price_free", SubscriptionStatus::Active, 0)];
        assert_eq!(derive_tier(&subs), MemberStatus::Paid);
    }

    #[test]
    fn legacy_comped_without_subscription_moves_to_free() {
        assert_eq!(
            transition(MemberStatus::Comped, &[]),
            Some(StatusTransition {
                from: MemberStatus::Comped,
                to: MemberStatus::Free
            })
        );
    }

    #[test]
    fn transition_is_none_when_in_sync() {
        let subs = vec![sub("sub_1", "price_1", SubscriptionStatus::Active, 500)];
        assert_eq!(transition(MemberStatus::Paid, &subs), None);
    }

    #[test]
    fn active_plan_ids_skips_inactive_and_duplicates() {
        let subs = vec![
            sub("sub_1", "price_a", SubscriptionStatus::Active, 500),
            sub("sub_2", "price_a", SubscriptionStatus::PastDue, 500),
            sub("sub_3", "price_b", SubscriptionStatus::Canceled, 500),
            sub("sub_4", "price_c", SubscriptionStatus::Trialing, 500),
        ];
        assert_eq!(active_plan_ids(&subs), vec!["price_a", "price_c"]);
    }

    fn status() -> impl Strategy<Value = SubscriptionStatus> {
        proptest::sample::select(SubscriptionStatus::all().to_vec())
    }

    proptest! {
        #[test]
        fn derivation_ignores_order(
            statuses in proptest::collection::vec(status(), 0..8),
        ) {
            let subs: Vec<Subscription> = statuses
                .iter()
                .enumerate()
                .map(|(i, s)| sub(&format!("sub_{}", i), "price_1", *s, 500))
                .collect();
            let mut reversed = subs.clone();
            reversed.reverse();

            prop_assert_eq!(derive_tier(&subs), derive_tier(&reversed));
        }

        #[test]
        fn applying_a_transition_reaches_a_fixed_point(
            statuses in proptest::collection::vec(status(), 0..8),
            start_paid in any::<bool>(),
        ) {
            let subs: Vec<Subscription> = statuses
                .iter()
                .enumerate()
                .map(|(i, s)| sub(&format!("sub_{}", i), "price_1", *s, 500))
                .collect();
            let mut current = if start_paid { MemberStatus::Paid } else { MemberStatus::Free };

            if let Some(change) = transition(current, &subs) {
                current = change.to;
            }

            prop_assert_eq!(transition(current, &subs), None);
        }
    }
}
