use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;

use super::WatcherIndex;
use crate::error::{Result, StoreError};
use crate::state::{State, WILDCARD};

/// Unique, monotonically assigned subscription id. Never zero, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(NonZeroU64);

impl SubscriptionId {
    /// Rebuild an id from its raw value. Zero is not a valid id.
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Anything that accepts new state snapshots.
pub trait Subscriber: Send + Sync {
    /// Called synchronously with the new full snapshot on every notification.
    fn update_state(&self, state: &State);
}

impl<F> Subscriber for F
where
    F: Fn(&State) + Send + Sync,
{
    fn update_state(&self, state: &State) {
        self(state)
    }
}

/// A registered interest in a set of slice keys.
#[derive(Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub subscriber: Arc<dyn Subscriber>,
    pub watching: Vec<String>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("watching", &self.watching)
            .finish_non_exhaustive()
    }
}

/// Live subscriptions keyed by id, plus the watcher index derived from them.
#[derive(Debug)]
pub struct SubscriptionRegistry {
    last_id: u64,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    watchers: WatcherIndex,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self {
            last_id: 0,
            subscriptions: BTreeMap::new(),
            watchers: WatcherIndex::new(),
        }
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber` for `watching`. An empty key list watches
    /// everything; duplicate keys are collapsed.
    pub fn subscribe(
        &mut self,
        subscriber: Arc<dyn Subscriber>,
        watching: Vec<String>,
    ) -> Result<SubscriptionId> {
        if watching.iter().any(String::is_empty) {
            return Err(StoreError::invalid("watched keys must be non-empty strings"));
        }

        let mut keys: Vec<String> = Vec::with_capacity(watching.len().max(1));
        for key in watching {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        if keys.is_empty() {
            keys.push(WILDCARD.to_string());
        }

        let id = self.next_id()?;
        for key in &keys {
            self.watchers.add(key, id);
        }
        self.subscriptions.insert(
            id,
            Subscription {
                id,
                subscriber,
                watching: keys,
            },
        );
        Ok(id)
    }

    /// Remove a subscription from every bucket it appears in.
    /// Returns the removed record, or `None` for an unknown id.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> Option<Subscription> {
        let subscription = self.subscriptions.remove(&id)?;
        for key in &subscription.watching {
            self.watchers.remove(key, id);
        }
        Some(subscription)
    }

    pub fn get(&self, id: SubscriptionId) -> Option<&Subscription> {
        self.subscriptions.get(&id)
    }

    /// All live ids in subscription order.
    pub fn ids(&self) -> Vec<SubscriptionId> {
        self.subscriptions.keys().copied().collect()
    }

    pub fn watchers(&self) -> &WatcherIndex {
        &self.watchers
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    fn next_id(&mut self) -> Result<SubscriptionId> {
        let raw = self
            .last_id
            .checked_add(1)
            .ok_or_else(|| StoreError::invalid("subscription ids exhausted"))?;
        let id = SubscriptionId::from_raw(raw)
            .ok_or_else(|| StoreError::invalid("subscription ids exhausted"))?;
        self.last_id = raw;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> Arc<dyn Subscriber> {
        Arc::new(|_: &State| {})
    }

    fn keys(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn ids_are_monotonic_from_one() {
        let mut registry = SubscriptionRegistry::new();
        let first = registry.subscribe(quiet(), keys(&["*"])).unwrap();
        let second = registry.subscribe(quiet(), keys(&["a"])).unwrap();
        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 2);
    }

    #[test]
    fn ids_not_reused_after_unsubscribe() {
        let mut registry = SubscriptionRegistry::new();
        let first = registry.subscribe(quiet(), keys(&["a"])).unwrap();
        assert!(registry.unsubscribe(first).is_some());
        let second = registry.subscribe(quiet(), keys(&["a"])).unwrap();
        assert_ne!(first, second);
        assert!(second > first);
    }

    #[test]
    fn empty_watch_list_defaults_to_wildcard() {
        let mut registry = SubscriptionRegistry::new();
        let id = registry.subscribe(quiet(), Vec::new()).unwrap();
        assert_eq!(registry.get(id).unwrap().watching, keys(&["*"]));
        assert_eq!(registry.watchers().bucket(WILDCARD), &[id]);
    }

    #[test]
    fn duplicate_keys_collapse() {
        let mut registry = SubscriptionRegistry::new();
        let id = registry.subscribe(quiet(), keys(&["a", "a", "b"])).unwrap();
        assert_eq!(registry.get(id).unwrap().watching, keys(&["a", "b"]));
        assert_eq!(registry.watchers().bucket("a"), &[id]);
    }

    #[test]
    fn empty_key_is_invalid_and_changes_nothing() {
        let mut registry = SubscriptionRegistry::new();
        let err = registry.subscribe(quiet(), keys(&["a", ""])).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert!(registry.is_empty());
        assert!(registry.watchers().bucket("a").is_empty());

        // The failed attempt did not consume an id.
        let id = registry.subscribe(quiet(), keys(&["a"])).unwrap();
        assert_eq!(id.get(), 1);
    }

    #[test]
    fn unsubscribe_clears_every_bucket() {
        let mut registry = SubscriptionRegistry::new();
        let keep = registry.subscribe(quiet(), keys(&["a"])).unwrap();
        let gone = registry.subscribe(quiet(), keys(&["a", "b", "*"])).unwrap();

        assert!(registry.unsubscribe(gone).is_some());
        assert_eq!(registry.watchers().bucket("a"), &[keep]);
        assert!(registry.watchers().bucket("b").is_empty());
        assert!(registry.watchers().bucket(WILDCARD).is_empty());
        assert!(registry.unsubscribe(gone).is_none());
        assert_eq!(registry.ids(), vec![keep]);
    }

    #[test]
    fn zero_is_not_an_id() {
        assert!(SubscriptionId::from_raw(0).is_none());
        assert_eq!(SubscriptionId::from_raw(7).unwrap().to_string(), "7");
    }
}
