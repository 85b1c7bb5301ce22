//! Monthly-recurring-revenue normalization.

use super::subscription::{PlanInterval, SubscriptionStatus};

/// Normalizes a plan to its monthly revenue in minor currency units.
///
/// Trialing, incomplete and cancelled subscriptions contribute nothing.
/// Yearly plans floor-divide by twelve so MRR is never over-counted.
pub fn mrr_delta(interval: PlanInterval, amount: i64, status: SubscriptionStatus) -> i64 {
    if !status.contributes_revenue() {
        return 0;
    }

    match interval {
        PlanInterval::Year => amount.div_euclid(12),
        PlanInterval::Month => amount,
        PlanInterval::Week => amount.saturating_mul(4),
        PlanInterval::Day => amount.saturating_mul(30),
    }
}
