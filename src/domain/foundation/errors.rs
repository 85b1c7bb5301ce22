//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,
    InvalidFormat,

    // Not found errors
    MemberNotFound,
    SubscriptionNotFound,
    ProductNotFound,

    // Conflict errors
    MemberExists,
    CustomerAlreadyLinked,
    SubscriptionExists,

    // Billing errors
    SubscriptionNotLinked,
    MalformedSubscription,
    BillingError,

    // Infrastructure errors
    DatabaseError,
    SerializationError,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::MemberNotFound => "MEMBER_NOT_FOUND",
            ErrorCode::SubscriptionNotFound => "SUBSCRIPTION_NOT_FOUND",
            ErrorCode::ProductNotFound => "PRODUCT_NOT_FOUND",
            ErrorCode::MemberExists => "MEMBER_EXISTS",
            ErrorCode::CustomerAlreadyLinked => "CUSTOMER_ALREADY_LINKED",
            ErrorCode::SubscriptionExists => "SUBSCRIPTION_EXISTS",
            ErrorCode::SubscriptionNotLinked => "SUBSCRIPTION_NOT_LINKED",
            ErrorCode::MalformedSubscription => "MALFORMED_SUBSCRIPTION",
            ErrorCode::BillingError => "BILLING_ERROR",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::SerializationError => "SERIALIZATION_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message).with_detail("field", field.into())
    }

    /// Creates a storage-layer error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::new(ErrorCode::SerializationError, err.to_string())
    }
}
