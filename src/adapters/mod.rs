//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `stripe` - Stripe REST transport, billing gateway and its mock
//! - `memory` - In-memory storage, ledger, catalog and mailer
//! - `events` - In-memory event bus

pub mod events;
pub mod memory;
pub mod stripe;

pub use events::InMemoryEventBus;
pub use memory::{
    InMemoryEventLedger, InMemoryMemberStore, InMemoryProductCatalog,
    InMemoryWebhookEventRepository, RecordingMailer,
};
pub use stripe::{MockBillingGateway, StripeBillingGateway, StripeHttpApi};
