//! Members Billing - membership and Stripe subscription reconciliation.
//!
//! Keeps local member records, subscription rows and the revenue ledger
//! consistent with Stripe, whether changes arrive through the API or as
//! webhook deliveries.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
