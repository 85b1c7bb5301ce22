//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the membership core and the outside world. Adapters implement these ports.
//!
//! ## Billing Ports
//!
//! - `BillingGateway` - Typed Stripe capabilities with retry and idempotency
//! - `StripeApi` - Raw resource CRUD the gateway is built on
//!
//! ## Storage Ports
//!
//! - `MemberStore` - Members, customer links and subscription rows
//! - `EventLedger` - Append-only status, subscribe, MRR and payment history
//! - `ProductCatalog` - Content-gating products and their prices
//! - `WebhookEventRepository` - Stripe webhook idempotency tracking
//!
//! ## Notification Ports
//!
//! - `EventPublisher` - Outbound domain events
//! - `SignupMailer` - Post-checkout welcome email

mod billing_gateway;
mod event_ledger;
mod event_publisher;
mod member_store;
mod product_catalog;
mod signup_mailer;
mod stripe_api;
mod webhook_event_repository;

pub use billing_gateway::{BillingGateway, PriceSpec};
pub use event_ledger::EventLedger;
pub use event_publisher::EventPublisher;
pub use member_store::MemberStore;
pub use product_catalog::ProductCatalog;
pub use signup_mailer::SignupMailer;
pub use stripe_api::{FormParams, StripeApi, StripeResource};
pub use webhook_event_repository::{
    HandledAs, SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookResult,
};
