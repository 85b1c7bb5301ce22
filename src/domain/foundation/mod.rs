//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, events and error types
//! that form the vocabulary of the membership billing domain.

mod errors;
mod events;
mod ids;
mod timestamp;

pub use errors::{DomainError, ErrorCode};
pub use events::{DomainEvent, EventEnvelope, EventId, EventMetadata};
pub use ids::MemberId;
pub use timestamp::Timestamp;
