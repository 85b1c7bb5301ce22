//! Billing-provider error taxonomy.

use std::fmt;
use thiserror::Error;

/// Failure classes a Stripe call can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BillingErrorKind {
    /// HTTP 429. Retried with exponential backoff.
    RateLimited,
    CardDeclined,
    InvalidRequest,
    AuthenticationFailed,
    /// The addressed resource does not exist.
    ResourceMissing,
    /// Connection or timeout failure before a response arrived.
    TransientNetworkError,
    /// Any other provider-side failure (5xx, unexpected body).
    Provider,
}

impl fmt::Display for BillingErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BillingErrorKind::RateLimited => "rate_limited",
            BillingErrorKind::CardDeclined => "card_declined",
            BillingErrorKind::InvalidRequest => "invalid_request",
            BillingErrorKind::AuthenticationFailed => "authentication_failed",
            BillingErrorKind::ResourceMissing => "resource_missing",
            BillingErrorKind::TransientNetworkError => "transient_network_error",
            BillingErrorKind::Provider => "provider_error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("billing {kind}: {message}")]
pub struct BillingError {
    pub kind: BillingErrorKind,
    pub message: String,
    /// Stripe's `error.code`, when the response carried one.
    pub provider_code: Option<String>,
    /// Id of the resource the failed call addressed.
    pub requested_id: Option<String>,
}

impl BillingError {
    pub fn new(kind: BillingErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider_code: None,
            requested_id: None,
        }
    }

    pub fn missing(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(BillingErrorKind::ResourceMissing, format!("No such resource: '{}'", id))
            .with_requested_id(id)
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn with_requested_id(mut self, id: impl Into<String>) -> Self {
        self.requested_id = Some(id.into());
        self
    }

    pub fn is(&self, kind: BillingErrorKind) -> bool {
        self.kind == kind
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            BillingErrorKind::RateLimited | BillingErrorKind::TransientNetworkError
        )
    }

    /// Errors caused by the request itself rather than the provider.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind,
            BillingErrorKind::CardDeclined
                | BillingErrorKind::InvalidRequest
                | BillingErrorKind::AuthenticationFailed
                | BillingErrorKind::ResourceMissing
        )
    }
}
