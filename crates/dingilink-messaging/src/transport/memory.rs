//! In-process transport
//!
//! Clones of one [`InMemoryTransport`] share a hub, so several event buses
//! built over clones behave like separate server processes on the same
//! broker. Publishes are counted per topic.
//!
//! Every route owns one worker task draining its own queue, so payloads
//! reach a handler in publish order and a slow handler only delays itself.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dingilink_common::{DingilinkError, Result};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{InboundHandler, Transport, TransportSubscription};

struct Route {
    id: u64,
    queue: mpsc::UnboundedSender<Vec<u8>>,
}

#[derive(Default)]
struct Hub {
    routes: RwLock<HashMap<String, Vec<Route>>>,
    published: RwLock<HashMap<String, usize>>,
    next_route: AtomicU64,
    closed: AtomicBool,
}

#[derive(Clone, Default)]
pub struct InMemoryTransport {
    hub: Arc<Hub>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total publishes across all topics
    pub async fn publish_count(&self) -> usize {
        self.hub.published.read().await.values().sum()
    }

    pub async fn publish_count_for(&self, topic: &str) -> usize {
        self.hub.published.read().await.get(topic).copied().unwrap_or(0)
    }

    /// Number of live subscriptions on `topic`
    pub async fn route_count(&self, topic: &str) -> usize {
        self.hub.routes.read().await.get(topic).map_or(0, Vec::len)
    }

    /// Make every later publish and subscribe fail
    pub fn close(&self) {
        self.hub.closed.store(true, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.hub.closed.load(Ordering::SeqCst) {
            return Err(DingilinkError::Transport("transport is closed".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for InMemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryTransport")
            .field("closed", &self.hub.closed.load(Ordering::SeqCst))
            .finish()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.ensure_open()?;
        *self
            .hub
            .published
            .write()
            .await
            .entry(topic.to_string())
            .or_default() += 1;

        let routes = self.hub.routes.read().await;
        let topic_routes = routes.get(topic).map_or(&[][..], Vec::as_slice);
        debug!("🔧 Publishing to {} ({} routes)", topic, topic_routes.len());

        for route in topic_routes {
            if route.queue.send(payload.clone()).is_err() {
                debug!("🔧 Route {} on {} has stopped", route.id, topic);
            }
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn InboundHandler>,
    ) -> Result<Box<dyn TransportSubscription>> {
        self.ensure_open()?;
        let id = self.hub.next_route.fetch_add(1, Ordering::SeqCst);
        let (queue, mut inbox) = mpsc::unbounded_channel::<Vec<u8>>();
        let stop = CancellationToken::new();

        let worker_stop = stop.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = worker_stop.cancelled() => break,
                    payload = inbox.recv() => match payload {
                        Some(payload) => handler.handle(payload).await,
                        None => break,
                    },
                }
            }
        });

        self.hub
            .routes
            .write()
            .await
            .entry(topic.to_string())
            .or_default()
            .push(Route { id, queue });

        Ok(Box::new(MemorySubscription {
            hub: Arc::downgrade(&self.hub),
            topic: topic.to_string(),
            id,
            stop,
        }))
    }
}

struct MemorySubscription {
    hub: Weak<Hub>,
    topic: String,
    id: u64,
    stop: CancellationToken,
}

impl fmt::Debug for MemorySubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySubscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .finish()
    }
}

#[async_trait]
impl TransportSubscription for MemorySubscription {
    async fn unsubscribe(&self) -> Result<()> {
        self.stop.cancel();
        let Some(hub) = self.hub.upgrade() else {
            return Ok(());
        };

        let mut routes = hub.routes.write().await;
        if let Some(topic_routes) = routes.get_mut(&self.topic) {
            topic_routes.retain(|route| route.id != self.id);
            if topic_routes.is_empty() {
                routes.remove(&self.topic);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Forward(mpsc::UnboundedSender<Vec<u8>>);

    #[async_trait]
    impl InboundHandler for Forward {
        async fn handle(&self, payload: Vec<u8>) {
            let _ = self.0.send(payload);
        }
    }

    #[tokio::test]
    async fn test_clones_share_one_hub() {
        let node_a = InMemoryTransport::new();
        let node_b = node_a.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let subscription = node_b.subscribe("user_1", Arc::new(Forward(tx))).await.unwrap();
        node_a.publish("user_1", b"hello".to_vec()).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), b"hello".to_vec());
        assert_eq!(node_b.publish_count_for("user_1").await, 1);
        assert_eq!(node_a.route_count("user_1").await, 1);

        subscription.unsubscribe().await.unwrap();
        subscription.unsubscribe().await.unwrap();
        assert_eq!(node_a.route_count("user_1").await, 0);

        node_a.publish("user_1", b"lost".to_vec()).await.unwrap();
        assert_eq!(node_a.publish_count().await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_route_sees_publish_order() {
        let transport = InMemoryTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = transport.subscribe("user_9", Arc::new(Forward(tx))).await.unwrap();

        for i in 0u32..200 {
            transport
                .publish("user_9", i.to_be_bytes().to_vec())
                .await
                .unwrap();
        }

        for expected in 0u32..200 {
            let payload = rx.recv().await.unwrap();
            assert_eq!(payload, expected.to_be_bytes().to_vec());
        }
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_the_route_worker() {
        let transport = InMemoryTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = transport.subscribe("user_3", Arc::new(Forward(tx))).await.unwrap();

        subscription.unsubscribe().await.unwrap();
        transport.publish("user_3", b"late".to_vec()).await.unwrap();

        // The worker dropped its handler, which closes the forward channel
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_closed_transport_rejects_publish() {
        let transport = InMemoryTransport::new();
        transport.close();
        assert!(matches!(
            transport.publish("user_1", Vec::new()).await,
            Err(DingilinkError::Transport(_))
        ));
    }
}
