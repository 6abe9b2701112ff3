//! Distributed Transport Layer
//!
//! The publish/subscribe primitive that bridges server processes. The event
//! bus only needs topic-addressed publish and per-topic subscription with a
//! handler; delivery guarantees are the transport's business.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use dingilink_common::Result;

mod memory;

pub use memory::InMemoryTransport;

/// Receives raw payloads published to a subscribed topic
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle(&self, payload: Vec<u8>);
}

/// A live topic subscription
#[async_trait]
pub trait TransportSubscription: Debug + Send + Sync {
    /// Stop receiving. Calling it again is a no-op.
    async fn unsubscribe(&self) -> Result<()>;
}

/// Topic-addressed publish/subscribe
#[async_trait]
pub trait Transport: Debug + Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn InboundHandler>,
    ) -> Result<Box<dyn TransportSubscription>>;
}
