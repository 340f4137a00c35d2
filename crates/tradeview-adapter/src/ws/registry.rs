/*
[INPUT]:  Subscribe/unsubscribe requests from any number of consumers
[OUTPUT]: Keys that must go on the wire, and the full set to replay on reconnect
[POS]:    WebSocket layer - per-channel reference-counted interest set
[UPDATE]: When changing subscription bookkeeping semantics
*/

use std::collections::{BTreeMap, BTreeSet};

/// Reference-counted interest keys for one channel.
///
/// A key stays subscribed on the wire while at least one consumer holds it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionRegistry {
    counts: BTreeMap<String, usize>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take one reference on each key; returns keys that were not held before.
    ///
    /// Duplicates within one call count once.
    pub fn acquire<I, S>(&mut self, keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = Vec::new();
        for key in dedup(keys) {
            let count = self.counts.entry(key.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                added.push(key);
            }
        }
        added
    }

    /// Drop one reference on each key; returns keys nobody holds anymore.
    ///
    /// Keys without references are ignored.
    pub fn release<I, S>(&mut self, keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut removed = Vec::new();
        for key in dedup(keys) {
            let Some(count) = self.counts.get_mut(&key) else {
                continue;
            };
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&key);
                removed.push(key);
            }
        }
        removed
    }

    /// Current keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.counts.keys().cloned().collect()
    }

    pub fn ref_count(&self, key: &str) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.counts.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

fn dedup<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = BTreeSet::new();
    keys.into_iter()
        .map(Into::into)
        .filter(|key| seen.insert(key.clone()))
        .collect()
}
