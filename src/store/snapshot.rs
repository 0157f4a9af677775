use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use super::change::ChangeDetector;
use crate::reducer::{ReducerEntry, Reduction};
use crate::state::{merge_top_level, State};

/// Reducer output for one action, not yet merged into the snapshot.
#[derive(Debug, Default, PartialEq)]
pub struct Staged {
    /// Partial (slice mode) or full replacement (flat mode) state.
    pub update: State,
    /// Slices written, in reducer order. Empty in flat mode.
    pub modified: Vec<String>,
}

impl Staged {
    /// Slice mode: each entry reduces `current[entry.slice]`; results are
    /// staged per slice. Non-object slices and dropped reductions are skipped.
    pub fn slices(
        action: &str,
        current: &State,
        entries: &[ReducerEntry],
        payload: Option<&Value>,
        debug: bool,
    ) -> Self {
        let mut staged = Staged::default();
        for entry in entries {
            let Some(Value::Object(slice)) = current.get(&entry.slice) else {
                if debug {
                    warn!(
                        target: "statex",
                        action,
                        slice = %entry.slice,
                        "slice missing or not an object, reducer skipped"
                    );
                }
                continue;
            };

            match (entry.reducer)(slice, payload) {
                Reduction::Replace(next) => {
                    staged.update.insert(entry.slice.clone(), Value::Object(next));
                    if !staged.modified.contains(&entry.slice) {
                        staged.modified.push(entry.slice.clone());
                    }
                }
                Reduction::Unchanged => {
                    if debug {
                        warn!(
                            target: "statex",
                            action,
                            slice = %entry.slice,
                            "reducer returned no state, contribution dropped"
                        );
                    }
                }
            }
        }
        staged
    }

    /// Flat mode: every entry sees the pre-dispatch state; the last
    /// replacement wins outright.
    pub fn flat(
        action: &str,
        current: &State,
        entries: &[ReducerEntry],
        payload: Option<&Value>,
        debug: bool,
    ) -> Self {
        let mut staged = Staged::default();
        for entry in entries {
            match (entry.reducer)(current, payload) {
                Reduction::Replace(next) => staged.update = next,
                Reduction::Unchanged => {
                    if debug {
                        warn!(
                            target: "statex",
                            action,
                            "reducer returned no state, contribution dropped"
                        );
                    }
                }
            }
        }
        staged
    }
}

/// Holds the current snapshot and the change detector guarding it.
pub struct StateStore {
    current: Arc<State>,
    detector: Box<dyn ChangeDetector>,
}

impl StateStore {
    pub fn new(initial: State, mut detector: Box<dyn ChangeDetector>) -> Self {
        detector.prime(&initial);
        Self {
            current: Arc::new(initial),
            detector,
        }
    }

    pub fn snapshot(&self) -> Arc<State> {
        Arc::clone(&self.current)
    }

    /// Merge `staged` over the current snapshot. Returns the new snapshot
    /// when it differs, otherwise leaves everything untouched.
    pub fn commit(&mut self, staged: State) -> Option<Arc<State>> {
        let next = merge_top_level(&self.current, staged);
        if !self.detector.changed(&self.current, &next) {
            return None;
        }
        self.current = Arc::new(next);
        Some(Arc::clone(&self.current))
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}
