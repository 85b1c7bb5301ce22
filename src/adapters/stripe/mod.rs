//! Stripe adapters.
//!
//! - `StripeHttpApi` - REST transport implementing `StripeApi`
//! - `StripeBillingGateway` - typed gateway with retry and deterministic ids
//! - `MockBillingGateway` - in-memory gateway for tests

mod deterministic;
mod gateway;
mod http_api;
mod mock_billing_gateway;
mod retry;

pub use deterministic::{deterministic_id, DeterministicResource};
pub use gateway::StripeBillingGateway;
pub use http_api::{StripeHttpApi, StripeHttpConfig};
pub use mock_billing_gateway::{recurring_price, subscription_snapshot, MethodCall, MockBillingGateway};
pub use retry::RetryPolicy;
