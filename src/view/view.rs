use std::sync::{Arc, PoisonError, RwLock};

use crate::error::Result;
use crate::state::State;
use crate::store::Store;
use crate::subscription::SubscriptionId;

/// A locally held projection of the store state.
///
/// Mounting subscribes to the store and maps the current snapshot right
/// away; every notification re-runs the mapping. Dropping the view (or
/// calling [`StateView::unmount`]) unsubscribes.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use statex::{StateView, Store, StoreOptions};
///
/// let store = Store::initialize(StoreOptions::default(), &json!({ "count": 3 })).unwrap();
/// let view = StateView::mount(&store, ["*"], |state| state["count"].as_i64().unwrap_or(0))
///     .unwrap();
/// assert_eq!(view.get(), 3);
/// ```
pub struct StateView<V> {
    store: Store,
    id: Option<SubscriptionId>,
    local: Arc<RwLock<Slot<V>>>,
}

/// Mapped value plus whether a notification has written it since mount.
struct Slot<V> {
    value: V,
    notified: bool,
}

impl<V> Slot<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            notified: false,
        }
    }

    fn notify(&mut self, value: V) {
        self.value = value;
        self.notified = true;
    }

    /// Re-map a snapshot read after subscribing. A notification always
    /// carries a snapshot at least as new, so it wins.
    fn settle(&mut self, latest: &State, map: impl FnOnce(&State) -> V) {
        if !self.notified {
            self.value = map(latest);
        }
    }
}

impl<V: Clone + Send + Sync + 'static> StateView<V> {
    pub fn mount<F, I, K>(store: &Store, watching: I, map: F) -> Result<Self>
    where
        F: Fn(&State) -> V + Send + Sync + 'static,
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let before = store.state();
        let local = Arc::new(RwLock::new(Slot::new(map(&*before))));
        let map = Arc::new(map);

        let id = {
            let local = Arc::clone(&local);
            let map = Arc::clone(&map);
            store.subscribe(
                move |state: &State| {
                    let mapped = map(state);
                    local
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .notify(mapped);
                },
                watching,
            )?
        };

        // Catch a commit that landed between the first mapping and subscribing.
        {
            let mut slot = local.write().unwrap_or_else(PoisonError::into_inner);
            let after = store.state();
            if !Arc::ptr_eq(&before, &after) {
                slot.settle(&after, |state| map(state));
            }
        }

        Ok(Self {
            store: store.clone(),
            id: Some(id),
            local,
        })
    }

    /// Clone of the current local view.
    pub fn get(&self) -> V {
        self.local
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .value
            .clone()
    }

    /// Read the local view without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        let local = self.local.read().unwrap_or_else(PoisonError::into_inner);
        f(&local.value)
    }

    /// Subscription id while mounted.
    pub fn id(&self) -> Option<SubscriptionId> {
        self.id
    }

    /// Stop receiving updates. The last mapped value stays readable.
    pub fn unmount(&mut self) -> bool {
        match self.id.take() {
            Some(id) => self.store.unsubscribe(id),
            None => false,
        }
    }
}

impl<V> Drop for StateView<V> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.store.unsubscribe(id);
        }
    }
}
