//! Reducers and the per-action reducer registry.
//!
//! A reducer maps the current slice (slice mode) or whole state (flat mode)
//! plus an optional payload to a [`Reduction`]. Reducers registered for the
//! same action run in registration order.

mod registry;

pub use registry::{ReducerEntry, ReducerFn, ReducerRegistry, Reduction};
