//! Member and reconciliation errors.
//!
//! # Retry semantics
//!
//! | Error | Client error | Retryable |
//! |-------|--------------|-----------|
//! | NotFound / SubscriptionNotFound | yes | no |
//! | NotLinked / CustomerAlreadyLinked | yes | no |
//! | MalformedSubscriptionSnapshot | yes | no |
//! | InvalidEmail | yes | no |
//! | Billing | depends on kind | depends on kind |
//! | Storage / MissingDefaultProduct / NotConfigured | no | storage only |

use thiserror::Error;

use crate::domain::billing::BillingError;
use crate::domain::foundation::{DomainError, ErrorCode};

use super::aggregate::MemberSelector;

#[derive(Debug, Clone, Error)]
pub enum MemberError {
    #[error("member not found: {0}")]
    NotFound(MemberSelector),

    #[error("subscription not found: {0}")]
    SubscriptionNotFound(String),

    /// The subscription's customer is not associated with the addressed member.
    #[error("subscription {subscription_id} belongs to customer {customer_id}, which is not linked to this member")]
    NotLinked {
        subscription_id: String,
        customer_id: String,
    },

    #[error("customer {customer_id} is already linked to another member")]
    CustomerAlreadyLinked { customer_id: String },

    /// Subscription snapshot without exactly one price line. Never retried.
    #[error("malformed subscription snapshot {subscription_id}: {reason}")]
    MalformedSubscriptionSnapshot {
        subscription_id: String,
        reason: String,
    },

    #[error("invalid email address: {0:?}")]
    InvalidEmail(String),

    #[error("no default product is configured in the catalog")]
    MissingDefaultProduct,

    #[error("billing is not configured: {0}")]
    NotConfigured(String),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error("storage error: {0}")]
    Storage(#[from] DomainError),
}

impl MemberError {
    pub fn malformed(subscription_id: impl Into<String>, reason: impl Into<String>) -> Self {
        MemberError::MalformedSubscriptionSnapshot {
            subscription_id: subscription_id.into(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            MemberError::NotFound(_) => ErrorCode::MemberNotFound,
            MemberError::SubscriptionNotFound(_) => ErrorCode::SubscriptionNotFound,
            MemberError::NotLinked { .. } => ErrorCode::SubscriptionNotLinked,
            MemberError::CustomerAlreadyLinked { .. } => ErrorCode::CustomerAlreadyLinked,
            MemberError::MalformedSubscriptionSnapshot { .. } => ErrorCode::MalformedSubscription,
            MemberError::InvalidEmail(_) => ErrorCode::ValidationFailed,
            MemberError::MissingDefaultProduct => ErrorCode::ProductNotFound,
            MemberError::NotConfigured(_) => ErrorCode::InternalError,
            MemberError::Billing(_) => ErrorCode::BillingError,
            MemberError::Storage(err) => err.code,
        }
    }

    /// Errors the caller caused and should not retry unchanged.
    pub fn is_client_error(&self) -> bool {
        match self {
            MemberError::NotFound(_)
            | MemberError::SubscriptionNotFound(_)
            | MemberError::NotLinked { .. }
            | MemberError::CustomerAlreadyLinked { .. }
            | MemberError::MalformedSubscriptionSnapshot { .. }
            | MemberError::InvalidEmail(_) => true,
            MemberError::Billing(err) => err.is_client_error(),
            MemberError::MissingDefaultProduct
            | MemberError::NotConfigured(_)
            | MemberError::Storage(_) => false,
        }
    }

    /// Errors that may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            MemberError::Billing(err) => err.is_retryable(),
            MemberError::Storage(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::BillingErrorKind;
    use crate::domain::foundation::MemberId;

    #[test]
    fn not_linked_is_client_error_and_not_retried() {
        let err = MemberError::NotLinked {
            subscription_id: "sub_1".into(),
            customer_id: "cus_1".into(),
        };
        assert!(err.is_client_error());
        assert!(!err.is_retryable());
        assert_eq!(err.code(), ErrorCode::SubscriptionNotLinked);
    }

    #[test]
    fn malformed_snapshot_is_never_retried() {
        let err = MemberError::malformed("sub_1", "2 line items");
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "malformed subscription snapshot sub_1: 2 line items");
    }

    #[test]
    fn billing_errors_follow_their_kind() {
        let declined: MemberError = BillingError::new(BillingErrorKind::CardDeclined, "no").into();
        assert!(declined.is_client_error());
        assert!(!declined.is_retryable());

        let limited: MemberError = BillingError::new(BillingErrorKind::RateLimited, "slow").into();
        assert!(!limited.is_client_error());
        assert!(limited.is_retryable());
    }

    #[test]
    fn storage_errors_keep_their_code() {
        let err: MemberError = DomainError::database("connection reset").into();
        assert_eq!(err.code(), ErrorCode::DatabaseError);
        assert!(err.is_retryable());
    }

    #[test]
    fn not_found_displays_selector() {
        let id = MemberId::new();
        let err = MemberError::NotFound(MemberSelector::Id(id));
        assert_eq!(err.to_string(), format!("member not found: id={}", id));
    }
}
