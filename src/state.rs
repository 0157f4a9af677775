//! State representation shared by every component.

use serde_json::{Map, Value};

/// A state snapshot: string keys to arbitrary JSON values.
///
/// In slice mode every top-level key names an independent partition.
pub type State = Map<String, Value>;

/// Key matching every slice. Used as the default watch key and reducer slice.
pub const WILDCARD: &str = "*";

/// Shallow top-level merge: keys in `partial` overwrite those in `base`,
/// untouched keys are preserved.
pub(crate) fn merge_top_level(base: &State, partial: State) -> State {
    let mut merged = base.clone();
    for (key, value) in partial {
        merged.insert(key, value);
    }
    merged
}
