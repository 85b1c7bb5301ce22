//! MemberStore port - persistence for members, customer links and subscription rows.
//!
//! Storage-agnostic: the reconciliation core never sees a concrete database.
//! Implementations must keep `subscription_id` and member email unique.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, MemberId, Timestamp};
use crate::domain::member::{Member, MemberSelector, MemberStatus, StripeCustomer, Subscription};

#[async_trait]
pub trait MemberStore: Send + Sync {
    /// Resolves a member; `CustomerId` goes through the customer join.
    async fn find_member(&self, selector: &MemberSelector) -> Result<Option<Member>, DomainError>;

    /// Fails with `MemberExists` when the email is taken.
    async fn insert_member(&self, member: &Member) -> Result<(), DomainError>;

    /// Writes the editable profile fields. `status` and `products` are left
    /// as stored. Fails with `MemberNotFound` when the row is gone.
    async fn update_profile(&self, member: &Member) -> Result<(), DomainError>;

    /// Writes the derived tier and product grants only.
    async fn update_status(
        &self,
        id: &MemberId,
        status: MemberStatus,
        products: &[String],
        updated_at: Timestamp,
    ) -> Result<(), DomainError>;

    /// Removes the member row and its customer links. Subscription rows are kept.
    async fn delete_member(&self, id: &MemberId) -> Result<(), DomainError>;

    async fn customers_for_member(&self, id: &MemberId) -> Result<Vec<StripeCustomer>, DomainError>;

    async fn find_customer(&self, customer_id: &str) -> Result<Option<StripeCustomer>, DomainError>;

    async fn upsert_customer(&self, customer: &StripeCustomer) -> Result<(), DomainError>;

    async fn find_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Every subscription row owned by any of the member's customers.
    async fn subscriptions_for_member(&self, id: &MemberId)
        -> Result<Vec<Subscription>, DomainError>;

    /// Fails with `SubscriptionExists` on a duplicate id.
    async fn insert_subscription(&self, subscription: &Subscription) -> Result<(), DomainError>;

    async fn update_subscription(&self, subscription: &Subscription) -> Result<(), DomainError>;
}
