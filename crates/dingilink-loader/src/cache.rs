//! Per-window result slots
//!
//! A [`CacheStore`] lives for exactly one batch window. Each distinct key gets
//! one [`ResultSlot`] no matter how many callers asked for it, and the slot is
//! consumed when it is fulfilled, so every waiter is resolved exactly once.

use std::collections::HashMap;
use std::hash::Hash;

use dingilink_common::Result;
use tokio::sync::oneshot;

/// Outcome of one load: the value, `None` when the store has no such key, or
/// the error shared by the whole window
pub type LoadResult<V> = Result<Option<V>>;

/// Single-assignment result slot for one key
#[derive(Debug)]
pub struct ResultSlot<V> {
    waiters: Vec<oneshot::Sender<LoadResult<V>>>,
}

impl<V: Clone> ResultSlot<V> {
    fn new() -> Self {
        Self { waiters: Vec::new() }
    }

    fn subscribe(&mut self) -> oneshot::Receiver<LoadResult<V>> {
        let (tx, rx) = oneshot::channel();
        self.waiters.push(tx);
        rx
    }

    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    /// Resolve every waiter with `result`. Waiters that stopped listening
    /// are skipped.
    pub fn fulfill(self, result: LoadResult<V>) {
        let mut waiters = self.waiters.into_iter().peekable();
        while let Some(waiter) = waiters.next() {
            if waiters.peek().is_some() {
                let _ = waiter.send(result.clone());
            } else {
                let _ = waiter.send(result);
                break;
            }
        }
    }
}

/// The set of slots of one open window
#[derive(Debug)]
pub struct CacheStore<K, V> {
    slots: HashMap<K, ResultSlot<V>>,
}

impl<K, V> Default for CacheStore<K, V> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Register interest in `key`, creating its slot on first use
    pub fn subscribe(&mut self, key: K) -> oneshot::Receiver<LoadResult<V>> {
        self.slots.entry(key).or_insert_with(ResultSlot::new).subscribe()
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The deduplicated key set of this window
    pub fn keys(&self) -> Vec<K> {
        self.slots.keys().cloned().collect()
    }

    pub fn into_slots(self) -> impl Iterator<Item = (K, ResultSlot<V>)> {
        self.slots.into_iter()
    }
}
