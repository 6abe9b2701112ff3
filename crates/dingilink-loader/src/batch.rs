//! Batch Collector
//!
//! Collapses concurrent `load(key)` calls into one bulk fetch per window.
//!
//! The first load of an empty window schedules a flush task. That task waits
//! for the configured delay (or, with no delay, until a whole scheduling tick
//! passes without a new load), closes the window and calls [`BatchFn::fetch_many`] once with the
//! deduplicated key set. A window that reaches `max_batch_size` distinct keys
//! is flushed right away, and [`BatchCollector::dispatch`] flushes on demand.
//!
//! Nothing survives a flush: a collector is meant to live for one operation
//! and results are never served to a later window.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dingilink_common::{DingilinkError, Result};
use dingilink_core::LoaderConfig;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::cache::{CacheStore, LoadResult};

/// Bulk fetch function for one entity kind
#[async_trait]
pub trait BatchFn<K, V>: Send + Sync + 'static {
    /// Name of the entity kind, used in logs and fetch errors
    fn kind(&self) -> &'static str;

    /// Fetch all `keys` at once.
    ///
    /// Keys missing from the returned map resolve to `None`. A per-key error
    /// fails only that key; an `Err` for the whole call fails every key of
    /// the window.
    async fn fetch_many(&self, keys: &[K]) -> Result<HashMap<K, Result<V>>>;
}

struct Window<K, V> {
    store: CacheStore<K, V>,
    flush_scheduled: bool,
    /// Loads enqueued over the collector's lifetime, duplicates included
    enqueued: u64,
}

struct Inner<K, V, F> {
    fetcher: F,
    window: Mutex<Window<K, V>>,
    delay: Duration,
    max_batch_size: usize,
}

/// Coalescing loader for one entity kind
pub struct BatchCollector<K, V, F> {
    inner: Arc<Inner<K, V, F>>,
}

impl<K, V, F> Clone for BatchCollector<K, V, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, F> BatchCollector<K, V, F>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + 'static,
    F: BatchFn<K, V>,
{
    pub fn new(fetcher: F) -> Self {
        Self::with_config(fetcher, &LoaderConfig::default())
    }

    pub fn with_config(fetcher: F, config: &LoaderConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                window: Mutex::new(Window {
                    store: CacheStore::default(),
                    flush_scheduled: false,
                    enqueued: 0,
                }),
                delay: config.batch_delay(),
                max_batch_size: config.max_batch_size.max(1),
            }),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.inner.fetcher.kind()
    }

    /// Load one key. Resolves once the window holding it has been flushed.
    pub async fn load(&self, key: K) -> Result<Option<V>> {
        let receiver = self.enqueue(key);
        receiver.await.unwrap_or_else(|_| {
            Err(DingilinkError::Internal(format!(
                "{} batch was dropped before resolving",
                self.kind()
            )))
        })
    }

    /// Load several keys in the same window. Absent keys are left out of the
    /// map; the first error fails the whole call.
    pub async fn load_many<I>(&self, keys: I) -> Result<HashMap<K, V>>
    where
        I: IntoIterator<Item = K>,
    {
        let keys: Vec<K> = keys.into_iter().collect();
        let results = join_all(keys.iter().cloned().map(|key| self.load(key))).await;

        let mut found = HashMap::with_capacity(keys.len());
        for (key, result) in keys.into_iter().zip(results) {
            if let Some(value) = result? {
                found.insert(key, value);
            }
        }
        Ok(found)
    }

    /// Flush the open window now, without waiting for the scheduled flush
    pub async fn dispatch(&self) {
        let batch = self.take_window(false);
        flush(&self.inner, batch).await;
    }

    /// Number of distinct keys waiting in the open window
    pub fn pending(&self) -> usize {
        self.lock_window().store.len()
    }

    fn enqueue(&self, key: K) -> tokio::sync::oneshot::Receiver<LoadResult<V>> {
        let mut window = self.lock_window();
        let receiver = window.store.subscribe(key);
        window.enqueued += 1;

        if window.store.len() >= self.inner.max_batch_size {
            let batch = std::mem::take(&mut window.store);
            drop(window);
            debug!("🔧 {} window full, flushing {} keys", self.kind(), batch.len());
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { flush(&inner, batch).await });
        } else if !window.flush_scheduled {
            window.flush_scheduled = true;
            drop(window);
            let collector = self.clone();
            tokio::spawn(async move { collector.scheduled_flush().await });
        }

        receiver
    }

    async fn scheduled_flush(self) {
        if self.inner.delay.is_zero() {
            // Close only after a tick in which nothing was enqueued
            loop {
                let seen = self.lock_window().enqueued;
                tokio::task::yield_now().await;
                if self.lock_window().enqueued == seen {
                    break;
                }
            }
        } else {
            tokio::time::sleep(self.inner.delay).await;
        }

        let batch = self.take_window(true);
        flush(&self.inner, batch).await;
    }

    fn take_window(&self, clear_schedule: bool) -> CacheStore<K, V> {
        let mut window = self.lock_window();
        if clear_schedule {
            window.flush_scheduled = false;
        }
        std::mem::take(&mut window.store)
    }

    fn lock_window(&self) -> MutexGuard<'_, Window<K, V>> {
        self.inner
            .window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

async fn flush<K, V, F>(inner: &Inner<K, V, F>, batch: CacheStore<K, V>)
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + 'static,
    F: BatchFn<K, V>,
{
    if batch.is_empty() {
        return;
    }

    let start = Instant::now();
    let kind = inner.fetcher.kind();
    let keys = batch.keys();
    debug!("🔧 Fetching {} {} keys", keys.len(), kind);

    match inner.fetcher.fetch_many(&keys).await {
        Ok(mut found) => {
            for (key, slot) in batch.into_slots() {
                let outcome = match found.remove(&key) {
                    Some(Ok(value)) => Ok(Some(value)),
                    Some(Err(err)) => Err(err),
                    None => Ok(None),
                };
                slot.fulfill(outcome);
            }
            debug!("✅ Resolved {} {} keys in {:?}", keys.len(), kind, start.elapsed());
        }
        Err(err) => {
            warn!("⚠️ Bulk fetch of {} {} keys failed: {}", keys.len(), kind, err);
            for (_, slot) in batch.into_slots() {
                slot.fulfill(Err(err.clone()));
            }
        }
    }
}
