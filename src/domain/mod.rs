//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, timestamps, errors, event envelopes)
//! - `member` - Members, subscription rows, tier derivation and the ledger
//! - `billing` - Stripe wire shapes, webhook verification and dispatch

pub mod billing;
pub mod foundation;
pub mod member;
