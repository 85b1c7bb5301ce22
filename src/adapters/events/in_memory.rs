//! In-memory event bus.
//!
//! Captures published envelopes for assertions and local runs. Delivery is
//! synchronous and deterministic.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::EventPublisher;

/// In-memory event bus.
///
/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::new());
/// bus.publish(envelope).await?;
/// assert!(bus.has_event("member.subscription_created.v1"));
/// ```
pub struct InMemoryEventBus {
    published: RwLock<Vec<EventEnvelope>>,
    failing: AtomicBool,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self {
            published: RwLock::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent publish fail, to exercise fire-and-forget callers.
    pub fn fail_publishing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    // === Test Helpers ===

    pub fn published_events(&self) -> Vec<EventEnvelope> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.published_events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    pub fn events_for_aggregate(&self, aggregate_id: &str) -> Vec<EventEnvelope> {
        self.published_events()
            .into_iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn has_event(&self, event_type: &str) -> bool {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|e| e.event_type == event_type)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                format!("event bus unavailable for {}", event.event_type),
            ));
        }
        self.published
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }

    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}
