//! In-memory adapters for the storage and notification ports.
//!
//! Used by tests and local runs; state lives behind `tokio::sync::RwLock`.

mod event_ledger;
mod member_store;
mod product_catalog;
mod signup_mailer;
mod webhook_event_repository;

pub use event_ledger::InMemoryEventLedger;
pub use member_store::InMemoryMemberStore;
pub use product_catalog::InMemoryProductCatalog;
pub use signup_mailer::{RecordingMailer, SentSignupEmail};
pub use webhook_event_repository::InMemoryWebhookEventRepository;
