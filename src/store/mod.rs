//! The store: snapshot, reducers, subscriptions and dispatch behind one handle.
//!
//! Reducers and subscribers always run without any internal lock held, so
//! they may read the state, subscribe, or dispatch follow-up actions (which
//! are queued behind the current one).

mod change;
mod snapshot;
mod store;

pub use change::{ChangeDetector, SerializedEq, StructuralEq};
pub use snapshot::{StateStore, Staged};
pub use store::Store;
