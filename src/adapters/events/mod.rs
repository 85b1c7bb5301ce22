//! Event bus adapters.
//!
//! - `InMemoryEventBus` - Synchronous, in-process bus for tests and local runs

mod in_memory;

pub use in_memory::InMemoryEventBus;
