//! Member module - members, their Stripe subscriptions and the revenue ledger.
//!
//! # Module Structure
//!
//! - `aggregate` - Member, customer links, selectors and caller context
//! - `subscription` - Local subscription rows and Stripe status vocabulary
//! - `mrr` - Monthly-recurring-revenue normalization
//! - `status` - Tier derivation from a subscription set
//! - `ledger` - Append-only event records and analytics over them
//! - `catalog` - Content-gating products and their prices
//! - `events` - Outbound notifications
//! - `errors` - Member error types

mod aggregate;
mod catalog;
mod errors;
mod events;
mod ledger;
mod mrr;
mod status;
mod subscription;

pub use aggregate::{
    Actor, AppliedChanges, Member, MemberChanges, MemberSelector, MemberStatus, NewMember,
    RequestContext, StripeCustomer,
};
pub use catalog::{Product, ProductPrice};
pub use errors::MemberError;
pub use events::SubscriptionCreated;
pub use ledger::{
    mrr_by_currency, PaidSubscriptionEvent, PaymentEvent, StatusEvent, SubscribeEvent,
    SubscribeSource, SubscriberCount, SubscriberStats,
};
pub use mrr::mrr_delta;
pub use status::{active_plan_ids, derive_tier, transition, StatusTransition};
pub use subscription::{payment_method_id, PlanInterval, PlanSnapshot, Subscription, SubscriptionStatus};
