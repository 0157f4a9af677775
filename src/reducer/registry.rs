use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, StoreError};
use crate::state::State;

/// Outcome of a reducer call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reduction {
    /// The new slice (slice mode) or whole state (flat mode).
    Replace(State),
    /// No contribution from this reducer.
    Unchanged,
}

impl Reduction {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Reduction::Unchanged)
    }
}

impl From<State> for Reduction {
    fn from(state: State) -> Self {
        Reduction::Replace(state)
    }
}

/// Objects become [`Reduction::Replace`]; every other value is dropped.
impl From<Value> for Reduction {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Reduction::Replace(map),
            _ => Reduction::Unchanged,
        }
    }
}

impl From<Option<State>> for Reduction {
    fn from(state: Option<State>) -> Self {
        state.map_or(Reduction::Unchanged, Reduction::Replace)
    }
}

pub type ReducerFn = Arc<dyn Fn(&State, Option<&Value>) -> Reduction + Send + Sync>;

/// A reducer bound to the slice it reduces.
#[derive(Clone)]
pub struct ReducerEntry {
    pub slice: String,
    pub reducer: ReducerFn,
}

impl std::fmt::Debug for ReducerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReducerEntry")
            .field("slice", &self.slice)
            .finish_non_exhaustive()
    }
}

/// Action key to ordered reducer entries. Entries are never removed.
#[derive(Default)]
pub struct ReducerRegistry {
    reducers: HashMap<String, Vec<ReducerEntry>>,
}

impl ReducerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reducer for `action`, preserving registration order.
    ///
    /// The slice key is not checked against the store mode; it only has
    /// meaning in slice mode.
    pub fn register(&mut self, action: &str, slice: &str, reducer: ReducerFn) -> Result<()> {
        if action.is_empty() {
            return Err(StoreError::invalid("reducer action key must be a non-empty string"));
        }
        if slice.is_empty() {
            return Err(StoreError::invalid("reducer slice key must be a non-empty string"));
        }

        self.reducers
            .entry(action.to_string())
            .or_default()
            .push(ReducerEntry {
                slice: slice.to_string(),
                reducer,
            });
        Ok(())
    }

    /// Cloned entries so callers can run reducers without holding the registry.
    pub fn entries(&self, action: &str) -> Option<Vec<ReducerEntry>> {
        self.reducers.get(action).cloned()
    }

    pub fn count(&self, action: &str) -> usize {
        self.reducers.get(action).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> ReducerFn {
        Arc::new(|_: &State, _: Option<&Value>| Reduction::Unchanged)
    }

    #[test]
    fn register_preserves_order() {
        let mut registry = ReducerRegistry::new();
        registry.register("INC", "a", noop()).unwrap();
        registry.register("INC", "b", noop()).unwrap();
        registry.register("INC", "*", noop()).unwrap();

        let slices: Vec<_> = registry
            .entries("INC")
            .unwrap()
            .into_iter()
            .map(|e| e.slice)
            .collect();
        assert_eq!(slices, vec!["a", "b", "*"]);
        assert_eq!(registry.count("INC"), 3);
        assert_eq!(registry.count("DEC"), 0);
        assert!(registry.entries("DEC").is_none());
    }

    #[test]
    fn empty_keys_are_rejected() {
        let mut registry = ReducerRegistry::new();
        assert!(matches!(
            registry.register("", "*", noop()),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.register("INC", "", noop()),
            Err(StoreError::InvalidArgument(_))
        ));
        assert_eq!(registry.count(""), 0);
        assert_eq!(registry.count("INC"), 0);
    }

    #[test]
    fn value_conversion_drops_non_objects() {
        assert!(Reduction::from(json!(3)).is_unchanged());
        assert!(Reduction::from(json!([1, 2])).is_unchanged());
        assert!(Reduction::from(Value::Null).is_unchanged());
        assert_eq!(
            Reduction::from(json!({ "v": 1 })),
            Reduction::Replace(json!({ "v": 1 }).as_object().cloned().unwrap())
        );
    }
}
