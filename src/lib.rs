//! # Statex
//!
//! An in-memory state store with slice-aware pub/sub notification and
//! serialized action processing.
//!
//! ## Model
//!
//! - The state is a JSON object. In *flat* mode reducers receive and return
//!   the whole state; in *slice* mode every top-level key is an independent
//!   slice with its own reducers and watchers.
//! - Reducers are registered per action key and run in registration order.
//! - Subscribers watch slice keys (or `"*"` for everything) and receive the
//!   new full snapshot whenever a dispatch changes the state.
//! - Dispatches are serialized: one action is in flight at a time, the rest
//!   wait in FIFO order.
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use statex::{State, Store, StoreOptions};
//!
//! let store = Store::initialize(
//!     StoreOptions::default().slices(true),
//!     &json!({ "a": { "v": 0 }, "b": { "v": 0 } }),
//! )
//! .unwrap();
//!
//! store
//!     .register_slice_reducer("BUMP_A", "a", |slice, _| {
//!         json!({ "v": slice["v"].as_i64().unwrap_or(0) + 1 })
//!     })
//!     .unwrap();
//!
//! store.subscribe(|state: &State| println!("a = {}", state["a"]), ["a"]).unwrap();
//! store.dispatch("BUMP_A", None).wait().unwrap();
//! assert_eq!(store.state()["a"], json!({ "v": 1 }));
//! ```

pub mod dispatch;
pub mod error;
pub mod options;
pub mod reducer;
pub mod state;
pub mod store;
pub mod subscription;
pub mod view;

// Re-export main types for convenience
pub use dispatch::Dispatched;
pub use error::{Result, StoreError};
pub use options::{ChangeDetection, StoreOptions};
pub use reducer::Reduction;
pub use state::{State, WILDCARD};
pub use store::{ChangeDetector, SerializedEq, Store, StructuralEq};
pub use subscription::{Subscriber, SubscriptionId};
pub use view::StateView;
