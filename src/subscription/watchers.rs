use std::collections::HashMap;

use super::SubscriptionId;
use crate::state::WILDCARD;

/// Slice key to the ordered ids watching it. The wildcard bucket always exists.
#[derive(Debug)]
pub struct WatcherIndex {
    buckets: HashMap<String, Vec<SubscriptionId>>,
}

impl Default for WatcherIndex {
    fn default() -> Self {
        let mut buckets = HashMap::new();
        buckets.insert(WILDCARD.to_string(), Vec::new());
        Self { buckets }
    }
}

impl WatcherIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str, id: SubscriptionId) {
        let bucket = self.buckets.entry(key.to_string()).or_default();
        if !bucket.contains(&id) {
            bucket.push(id);
        }
    }

    /// Drop `id` from the bucket for `key`; emptied buckets other than the
    /// wildcard are removed.
    pub fn remove(&mut self, key: &str, id: SubscriptionId) {
        let Some(bucket) = self.buckets.get_mut(key) else {
            return;
        };
        bucket.retain(|watcher| *watcher != id);
        if bucket.is_empty() && key != WILDCARD {
            self.buckets.remove(key);
        }
    }

    /// Number of buckets currently held, the wildcard included.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn bucket(&self, key: &str) -> &[SubscriptionId] {
        self.buckets.get(key).map_or(&[], Vec::as_slice)
    }

    /// Union of the buckets for `keys` followed by the wildcard bucket,
    /// de-duplicated in first-seen order.
    pub fn resolve<'a, I>(&self, keys: I) -> Vec<SubscriptionId>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut resolved: Vec<SubscriptionId> = Vec::new();
        let wildcard = std::iter::once(WILDCARD);
        for key in keys.into_iter().chain(wildcard) {
            for id in self.bucket(key) {
                if !resolved.contains(id) {
                    resolved.push(*id);
                }
            }
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> SubscriptionId {
        SubscriptionId::from_raw(raw).unwrap()
    }

    #[test]
    fn wildcard_bucket_always_present() {
        let index = WatcherIndex::new();
        assert!(index.bucket(WILDCARD).is_empty());
        assert!(index.bucket("missing").is_empty());
    }

    #[test]
    fn resolve_dedups_in_first_seen_order() {
        let mut index = WatcherIndex::new();
        index.add("b", id(2));
        index.add("a", id(1));
        index.add("a", id(2));
        index.add(WILDCARD, id(3));
        index.add(WILDCARD, id(1));

        assert_eq!(index.resolve(["a", "b"]), vec![id(1), id(2), id(3)]);
        assert_eq!(index.resolve(["b"]), vec![id(2), id(3), id(1)]);
        assert_eq!(index.resolve(std::iter::empty()), vec![id(3), id(1)]);
    }

    #[test]
    fn remove_only_touches_named_bucket() {
        let mut index = WatcherIndex::new();
        index.add("a", id(1));
        index.add("b", id(1));
        index.remove("a", id(1));
        assert!(index.bucket("a").is_empty());
        assert_eq!(index.bucket("b"), &[id(1)]);
    }

    #[test]
    fn emptied_buckets_are_dropped_except_wildcard() {
        let mut index = WatcherIndex::new();
        index.add("a", id(1));
        index.add("a", id(2));
        index.add(WILDCARD, id(3));
        assert_eq!(index.bucket_count(), 2);

        index.remove("a", id(1));
        assert_eq!(index.bucket_count(), 2);
        index.remove("a", id(2));
        assert_eq!(index.bucket_count(), 1);

        index.remove(WILDCARD, id(3));
        assert_eq!(index.bucket_count(), 1);
        assert!(index.bucket(WILDCARD).is_empty());

        index.add("a", id(4));
        assert_eq!(index.bucket("a"), &[id(4)]);
    }
}
