//! Delivery Registry
//!
//! Version: 0.3.0
//! Purpose: Track which recipients have a live delivery channel in this process
//! License: Apache-2.0/MIT
//!
//! One entry per recipient. Lookups share a read lock; registration and
//! removal take the write lock. A registration is identified by its
//! subscription id so that a stale teardown can never remove a newer entry
//! for the same recipient.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::event::Event;
use crate::transport::TransportSubscription;

/// A recipient's in-process delivery channel and its transport route
#[derive(Debug)]
pub struct LocalSubscriber {
    pub subscription_id: u64,
    pub sender: mpsc::Sender<Event>,
    pub route: Box<dyn TransportSubscription>,
    /// Cancelled when this entry is torn down, however that happens
    pub released: CancellationToken,
}

#[derive(Debug, Default)]
pub struct DeliveryRegistry {
    subscribers: RwLock<HashMap<String, LocalSubscriber>>,
    next_id: AtomicU64,
}

impl DeliveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a subscription id, unique for the registry's lifetime
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Register `subscriber` for `recipient`, returning the entry it replaced
    pub async fn insert(
        &self,
        recipient: &str,
        subscriber: LocalSubscriber,
    ) -> Option<LocalSubscriber> {
        self.subscribers
            .write()
            .await
            .insert(recipient.to_string(), subscriber)
    }

    pub async fn remove(&self, recipient: &str) -> Option<LocalSubscriber> {
        self.subscribers.write().await.remove(recipient)
    }

    /// Remove the entry only while it still belongs to `subscription_id`
    pub async fn remove_if(&self, recipient: &str, subscription_id: u64) -> Option<LocalSubscriber> {
        let mut subscribers = self.subscribers.write().await;
        match subscribers.get(recipient) {
            Some(entry) if entry.subscription_id == subscription_id => {
                subscribers.remove(recipient)
            }
            _ => None,
        }
    }

    /// Clone of the recipient's sender, taken under the read lock
    pub async fn sender_for(&self, recipient: &str) -> Option<mpsc::Sender<Event>> {
        self.subscribers
            .read()
            .await
            .get(recipient)
            .map(|entry| entry.sender.clone())
    }

    pub async fn contains(&self, recipient: &str) -> bool {
        self.subscribers.read().await.contains_key(recipient)
    }

    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscribers.read().await.is_empty()
    }
}
