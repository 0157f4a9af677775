//! Subscriptions and the per-slice watcher index.
//!
//! Every subscription gets a fresh, never reused id. The watcher index maps
//! each watched key (plus the wildcard `"*"`) to the ids interested in it.

mod registry;
mod watchers;

pub use registry::{Subscriber, Subscription, SubscriptionId, SubscriptionRegistry};
pub use watchers::WatcherIndex;
