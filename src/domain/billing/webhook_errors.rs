//! Webhook error types for Stripe webhook handling.
//!
//! Defines all error conditions that can occur during webhook processing,
//! with HTTP status code mapping and retryability semantics.

use thiserror::Error;

use crate::domain::member::MemberError;

use super::errors::BillingError;

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Webhook timestamp is outside the acceptable window (5 minutes).
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Event timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Failed to parse webhook payload or signature header.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required field missing from webhook payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// A member the event refers to could not be resolved.
    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error(transparent)]
    Member(#[from] MemberError),

    #[error(transparent)]
    Billing(#[from] BillingError),

    /// Event was intentionally ignored (not an error condition).
    #[error("Event ignored: {0}")]
    Ignored(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// The handler did not finish within the delivery window.
    #[error("Handler timed out after {0}s")]
    Timeout(u64),
}

impl WebhookError {
    /// Returns true if Stripe should retry delivering this webhook.
    pub fn is_retryable(&self) -> bool {
        match self {
            WebhookError::Database(_)
            | WebhookError::MemberNotFound(_)
            | WebhookError::Timeout(_) => true,
            WebhookError::Member(err) => !err.is_client_error(),
            WebhookError::Billing(err) => !err.is_client_error(),
            _ => false,
        }
    }

    /// Maps the error to an HTTP status code.
    ///
    /// - 2xx: Event acknowledged, no retry
    /// - 4xx: Client error, no retry
    /// - 5xx: Server error, will retry
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookError::InvalidSignature | WebhookError::TimestampOutOfRange => 401,

            WebhookError::InvalidTimestamp
            | WebhookError::ParseError(_)
            | WebhookError::MissingField(_) => 400,

            WebhookError::Ignored(_) => 200,

            WebhookError::Member(err) if err.is_client_error() => 400,

            WebhookError::MemberNotFound(_)
            | WebhookError::Member(_)
            | WebhookError::Billing(_)
            | WebhookError::Database(_)
            | WebhookError::Timeout(_) => 500,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, WebhookError::Ignored(_))
    }
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        WebhookError::ParseError(err.to_string())
    }
}
