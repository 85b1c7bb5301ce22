//! WebhookEventRepository port - tracking of handled Stripe webhook events.
//!
//! Stripe may deliver the same event several times (timeouts, 5xx responses,
//! lost acknowledgements). Only handled outcomes are stored; a failed event
//! has no record so its redelivery runs the handler again.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp};

/// How a recorded event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandledAs {
    Success,
    /// Acknowledged without effect (unknown type, unrelated member, ...).
    Ignored,
}

/// Record of a handled webhook event.
#[derive(Debug, Clone)]
pub struct WebhookEventRecord {
    /// Stripe event ID (evt_xxx format).
    pub event_id: String,
    pub event_type: String,
    pub processed_at: Timestamp,
    pub handled_as: HandledAs,
    /// Why the event was ignored.
    pub reason: Option<String>,
    /// Original event payload for debugging.
    pub payload: serde_json::Value,
}

impl WebhookEventRecord {
    pub fn success(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Timestamp::now(),
            handled_as: HandledAs::Success,
            reason: None,
            payload,
        }
    }

    pub fn ignored(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        reason: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Timestamp::now(),
            handled_as: HandledAs::Ignored,
            reason: Some(reason.into()),
            payload,
        }
    }
}

/// Result of attempting to save a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// Record was inserted (first time seeing this event).
    Inserted,
    /// Record already exists (duplicate event).
    AlreadyExists,
}

/// Port for storing and retrieving handled webhook events.
///
/// Implementations should rely on a uniqueness constraint on `event_id` so
/// concurrent deliveries cannot both insert.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    /// Inserts unless a record for the event already exists.
    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError>;
}

/// Result of webhook processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookResult {
    /// Event was processed successfully.
    Processed,
    /// Event was already processed (idempotent skip).
    AlreadyProcessed,
}
