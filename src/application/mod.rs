//! Application layer - orchestration over the domain and its ports.
//!
//! - `member_repository` - Member CRUD and every subscription write path
//! - `reconciler` - Applies Stripe subscription snapshots and records MRR deltas
//! - `status_deriver` - Keeps member tier and products in step with subscriptions
//! - `subscription_locks` - Per-subscription critical sections
//! - `webhook_service` - Handlers for the Stripe events we react to
//! - `webhook_ingress` - Signature check, classification and timed dispatch
//! - `webhook_endpoint` - Registration of the Stripe webhook endpoint
//! - `ledger_stats` - Subscriber and MRR analytics

mod ledger_stats;
mod member_repository;
mod reconciler;
mod status_deriver;
mod subscription_locks;
mod webhook_endpoint;
mod webhook_ingress;
mod webhook_service;

pub use ledger_stats::LedgerAnalytics;
pub use member_repository::{BillingDefaults, DestroyOptions, MemberRepository};
pub use reconciler::{ReconcileAction, ReconcileOutcome, SubscriptionReconciler};
pub use status_deriver::{DerivedStatus, MemberStatusDeriver};
pub use subscription_locks::SubscriptionLocks;
pub use webhook_endpoint::{WebhookEndpointManager, WebhookRegistration};
pub use webhook_ingress::{IngressStage, WebhookAck, WebhookIngress};
pub use webhook_service::StripeWebhookService;
