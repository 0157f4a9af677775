use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, error, warn};

use super::change::{detector_for, ChangeDetector};
use super::snapshot::{StateStore, Staged};
use crate::dispatch::{ActionDispatcher, ActionRequest, Dispatched};
use crate::error::{Result, StoreError};
use crate::options::StoreOptions;
use crate::reducer::{ReducerFn, ReducerRegistry, Reduction};
use crate::state::{State, WILDCARD};
use crate::subscription::{Subscriber, SubscriptionId, SubscriptionRegistry};

/// Everything guarded by the store mutex. Never locked across user code.
struct Shared {
    state: StateStore,
    reducers: ReducerRegistry,
    subscriptions: SubscriptionRegistry,
    dispatcher: ActionDispatcher,
}

struct StoreInner {
    options: StoreOptions,
    shared: Mutex<Shared>,
}

/// A state store with slice-aware notification and serialized dispatch.
///
/// Cloning is cheap and yields another handle to the same store.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use statex::{Reduction, Store, StoreOptions};
///
/// let store = Store::initialize(StoreOptions::default(), &json!({ "count": 0 })).unwrap();
/// store
///     .register_reducer("INC", |state, _| {
///         let count = state["count"].as_i64().unwrap_or(0);
///         Reduction::from(json!({ "count": count + 1 }))
///     })
///     .unwrap();
///
/// store.dispatch("INC", None).wait().unwrap();
/// assert_eq!(store.state()["count"], json!(1));
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Create a store with an empty `{}` state.
    pub fn new(options: StoreOptions) -> Self {
        let detector = detector_for(options.change_detection);
        Self::build(options, State::new(), detector)
    }

    /// Create a store from a deep copy of `initial`, which must be an object.
    pub fn initialize(options: StoreOptions, initial: &Value) -> Result<Self> {
        let detector = detector_for(options.change_detection);
        Self::with_detector(options, initial, detector)
    }

    /// Like [`Store::initialize`] with a custom change detector.
    /// `options.change_detection` is ignored.
    pub fn with_detector(
        options: StoreOptions,
        initial: &Value,
        detector: Box<dyn ChangeDetector>,
    ) -> Result<Self> {
        let Value::Object(initial) = initial else {
            return Err(StoreError::invalid("initial state must be an object"));
        };
        Ok(Self::build(options, initial.clone(), detector))
    }

    fn build(options: StoreOptions, initial: State, detector: Box<dyn ChangeDetector>) -> Self {
        if options.debug {
            debug!(target: "statex", ?options, keys = initial.len(), "initialized state");
        }
        Self {
            inner: Arc::new(StoreInner {
                options,
                shared: Mutex::new(Shared {
                    state: StateStore::new(initial, detector),
                    reducers: ReducerRegistry::new(),
                    subscriptions: SubscriptionRegistry::new(),
                    dispatcher: ActionDispatcher::new(),
                }),
            }),
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.inner.options
    }

    /// Current full snapshot. Treat it as read-only; it is replaced, never
    /// mutated, by dispatches.
    pub fn state(&self) -> Arc<State> {
        self.lock().state.snapshot()
    }

    /// Read the current snapshot without cloning the handle.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&State) -> R,
    {
        let snapshot = self.state();
        f(&*snapshot)
    }

    /// Subscribe to changes of the slices named in `watching`.
    ///
    /// An empty key list watches everything (`"*"`). In flat mode every
    /// subscriber is notified on every change regardless of its keys.
    pub fn subscribe<S, I, K>(&self, subscriber: S, watching: I) -> Result<SubscriptionId>
    where
        S: Subscriber + 'static,
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let watching: Vec<String> = watching.into_iter().map(Into::into).collect();
        let mut shared = self.lock();
        let id = shared
            .subscriptions
            .subscribe(Arc::new(subscriber), watching)?;

        if self.debug() {
            let keys = shared
                .subscriptions
                .get(id)
                .map(|s| s.watching.clone())
                .unwrap_or_default();
            debug!(target: "statex", %id, ?keys, "subscribed");
        }
        Ok(id)
    }

    /// Subscribe to every change.
    pub fn subscribe_all<S>(&self, subscriber: S) -> Result<SubscriptionId>
    where
        S: Subscriber + 'static,
    {
        self.subscribe(subscriber, [WILDCARD])
    }

    /// Remove a subscription. Returns `false` if `id` is not live.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.lock().subscriptions.unsubscribe(id);
        match removed {
            Some(_) => {
                if self.debug() {
                    debug!(target: "statex", %id, "unsubscribed");
                }
                true
            }
            None => {
                if self.debug() {
                    warn!(target: "statex", %id, "unsubscribe called with an unknown id");
                }
                false
            }
        }
    }

    /// Register a reducer that receives the whole state (flat mode) for `action`.
    pub fn register_reducer<F, R>(&self, action: &str, reducer: F) -> Result<()>
    where
        F: Fn(&State, Option<&Value>) -> R + Send + Sync + 'static,
        R: Into<Reduction>,
    {
        self.register_slice_reducer(action, WILDCARD, reducer)
    }

    /// Register a reducer for `action` bound to `slice`.
    ///
    /// The slice key is only consulted in slice mode.
    pub fn register_slice_reducer<F, R>(&self, action: &str, slice: &str, reducer: F) -> Result<()>
    where
        F: Fn(&State, Option<&Value>) -> R + Send + Sync + 'static,
        R: Into<Reduction>,
    {
        let reducer: ReducerFn =
            Arc::new(move |state: &State, payload: Option<&Value>| -> Reduction {
                reducer(state, payload).into()
            });
        self.lock().reducers.register(action, slice, reducer)?;

        if self.debug() {
            debug!(target: "statex", action, slice, "registered reducer");
        }
        Ok(())
    }

    /// Dispatch an action.
    ///
    /// When the store is idle the action, and every action queued behind
    /// it, runs on the calling thread before this returns. When busy, the
    /// request is queued and the returned handle resolves once it ran.
    /// Validation errors are reported through the handle.
    pub fn dispatch(&self, action: impl Into<String>, payload: Option<Value>) -> Dispatched {
        let action = action.into();
        if action.is_empty() {
            return Dispatched::rejected(StoreError::invalid(
                "dispatch requires a non-empty action key",
            ));
        }

        let (request, handle) = ActionRequest::new(action, payload);
        let owns_queue = {
            let mut shared = self.lock();
            let owns_queue = shared.dispatcher.enqueue(request);
            if !owns_queue && self.debug() {
                debug!(
                    target: "statex",
                    pending = shared.dispatcher.pending(),
                    "action is being processed, queued"
                );
            }
            owns_queue
        };

        if owns_queue {
            self.drain();
        }
        handle
    }

    pub fn is_busy(&self) -> bool {
        self.lock().dispatcher.is_busy()
    }

    /// Actions waiting behind the one in flight.
    pub fn pending_actions(&self) -> usize {
        self.lock().dispatcher.pending()
    }

    pub fn subscription_count(&self) -> usize {
        self.lock().subscriptions.len()
    }

    /// Ids in the watcher bucket for `key`.
    pub fn watchers(&self, key: &str) -> Vec<SubscriptionId> {
        self.lock().subscriptions.watchers().bucket(key).to_vec()
    }

    pub fn reducer_count(&self, action: &str) -> usize {
        self.lock().reducers.count(action)
    }

    fn debug(&self) -> bool {
        self.inner.options.debug
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run queued actions until the queue is empty, then release the busy flag.
    fn drain(&self) {
        loop {
            let next = self.lock().dispatcher.next();
            let Some(request) = next else {
                break;
            };

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.process(&request.action, request.payload.as_ref())
            }));
            let result = outcome.unwrap_or_else(|_| {
                error!(target: "statex", action = %request.action, "action panicked");
                Err(StoreError::ActionPanicked {
                    action: request.action.clone(),
                })
            });
            request.complete(result);
        }
    }

    /// Apply reducers, commit on change, notify interested subscribers.
    ///
    /// A panicking subscriber does not stop the fan-out; the action fails
    /// once every remaining target was notified.
    fn process(&self, action: &str, payload: Option<&Value>) -> Result<()> {
        let started = Instant::now();
        if self.debug() {
            debug!(target: "statex", action, ?payload, "dispatching action");
        }

        let (entries, current) = {
            let shared = self.lock();
            (shared.reducers.entries(action), shared.state.snapshot())
        };
        let Some(entries) = entries else {
            warn!(target: "statex", action, "no reducers are listening for action");
            return Ok(());
        };

        let slices = self.inner.options.slices;
        let staged = if slices {
            Staged::slices(action, &current, &entries, payload, self.debug())
        } else {
            Staged::flat(action, &current, &entries, payload, self.debug())
        };
        if self.debug() {
            debug!(
                target: "statex",
                action,
                elapsed_us = started.elapsed().as_micros() as u64,
                "reducers completed, updating state"
            );
        }

        let update_started = Instant::now();
        let (next, targets) = {
            let mut shared = self.lock();
            let Some(next) = shared.state.commit(staged.update) else {
                if self.debug() {
                    debug!(target: "statex", action, "state unchanged, skipping notification");
                }
                return Ok(());
            };
            let targets = if slices {
                shared
                    .subscriptions
                    .watchers()
                    .resolve(staged.modified.iter().map(String::as_str))
            } else {
                shared.subscriptions.ids()
            };
            (next, targets)
        };

        let mut notified = 0usize;
        let mut panicked = 0usize;
        for id in targets {
            // Re-check liveness so a subscriber removed mid fan-out is skipped.
            let subscriber = self
                .lock()
                .subscriptions
                .get(id)
                .map(|s| Arc::clone(&s.subscriber));
            let Some(subscriber) = subscriber else {
                continue;
            };
            let delivered =
                panic::catch_unwind(AssertUnwindSafe(|| subscriber.update_state(&next)));
            match delivered {
                Ok(()) => notified += 1,
                Err(_) => {
                    error!(target: "statex", action, %id, "subscriber panicked during notification");
                    panicked += 1;
                }
            }
        }

        if self.debug() {
            debug!(
                target: "statex",
                action,
                notified,
                elapsed_us = update_started.elapsed().as_micros() as u64,
                "completed state update"
            );
        }

        if panicked > 0 {
            return Err(StoreError::ActionPanicked {
                action: action.to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}
