//! Serialized action dispatch.
//!
//! Exactly one action is in flight per store. Requests arriving while the
//! dispatcher is busy wait in a FIFO queue and are drained by whoever holds
//! the busy flag.

mod dispatcher;

pub use dispatcher::{ActionDispatcher, ActionRequest, Dispatched};
