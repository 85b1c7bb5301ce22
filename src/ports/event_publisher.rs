//! EventPublisher port - Interface for publishing outbound domain events.
//!
//! The membership core publishes notifications such as
//! `member.subscription_created.v1` without knowing the transport.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Port for publishing domain events.
///
/// Delivery is at-least-once; consumers must tolerate duplicates. Callers in
/// the reconciliation path treat publishing as fire-and-forget.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Publishes events in order, stopping at the first failure.
    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError>;
}
