//! Event Bus
//!
//! Version: 0.3.0
//! Purpose: Deliver events to a recipient wherever its connection lives
//! License: Apache-2.0/MIT
//!
//! A publish goes straight into the recipient's channel when this process
//! holds its subscription. Otherwise the event is wrapped in an envelope and
//! handed to the distributed transport, where the process that does hold
//! the subscription picks it up through its route and delivers it locally.
//!
//! # Lock discipline
//! Publish clones the recipient's sender under the registry read lock and
//! sends after releasing it. A send that finds the channel closed lost a
//! race with unsubscribe and falls back to the transport. A send that stays
//! blocked longer than the configured timeout drops the event for that
//! recipient only.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dingilink_common::{DingilinkError, Result};
use dingilink_core::MessagingConfig;
use futures::future::join_all;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::delivery::{DeliveryRegistry, LocalSubscriber};
use crate::envelope::Envelope;
use crate::event::Event;
use crate::kinds::EventRegistry;
use crate::transport::{InboundHandler, Transport};

/// Where a published event went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Straight into a subscriber channel in this process
    Local,
    /// Handed to the distributed transport
    Remote,
    /// The local subscriber stayed full past the send timeout
    Dropped,
}

#[derive(Clone)]
pub struct EventBus {
    transport: Arc<dyn Transport>,
    registry: Arc<EventRegistry>,
    delivery: Arc<DeliveryRegistry>,
    config: MessagingConfig,
}

impl EventBus {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: Arc<EventRegistry>,
        config: MessagingConfig,
    ) -> Self {
        Self {
            transport,
            registry,
            delivery: Arc::new(DeliveryRegistry::new()),
            config,
        }
    }

    /// Transport topic carrying events for `recipient`
    pub fn topic_for(&self, recipient: &str) -> String {
        format!("{}_{}", self.config.topic_prefix, recipient)
    }

    pub async fn is_subscribed(&self, recipient: &str) -> bool {
        self.delivery.contains(recipient).await
    }

    pub async fn local_subscribers(&self) -> usize {
        self.delivery.len().await
    }

    /// Become the local destination for `recipient`
    ///
    /// A previous subscription for the same recipient is superseded: its
    /// route is torn down and its stream ends.
    #[instrument(level = "debug", skip(self))]
    pub async fn subscribe(&self, recipient: &str) -> Result<Subscription> {
        self.subscribe_inner(recipient).await.map(|(subscription, _)| subscription)
    }

    async fn subscribe_inner(
        &self,
        recipient: &str,
    ) -> Result<(Subscription, CancellationToken)> {
        let start = Instant::now();
        debug!("🔧 Subscribing {}", recipient);

        let (sender, receiver) = mpsc::channel(self.config.channel_capacity.max(1));
        let subscription_id = self.delivery.next_id();
        let released = CancellationToken::new();

        let handler = Arc::new(RouteHandler {
            recipient: recipient.to_string(),
            registry: Arc::clone(&self.registry),
            sender: sender.downgrade(),
            send_timeout: self.config.send_timeout(),
        });
        let route = self
            .transport
            .subscribe(&self.topic_for(recipient), handler)
            .await?;

        let superseded = self
            .delivery
            .insert(
                recipient,
                LocalSubscriber {
                    subscription_id,
                    sender,
                    route,
                    released: released.clone(),
                },
            )
            .await;

        if let Some(prior) = superseded {
            info!(
                "🔧 Subscription {} for {} superseded by {}",
                prior.subscription_id, recipient, subscription_id
            );
            teardown(recipient, prior).await;
        }

        debug!("✅ Subscribed {} in {:?}", recipient, start.elapsed());
        let subscription = Subscription {
            id: subscription_id,
            recipient: recipient.to_string(),
            stream: ReceiverStream::new(receiver),
        };
        Ok((subscription, released))
    }

    /// Subscribe and release the subscription once `token` is cancelled
    ///
    /// The watcher also exits when the subscription ends first through
    /// unsubscribe or a newer subscription.
    pub async fn subscribe_until(
        &self,
        recipient: &str,
        token: CancellationToken,
    ) -> Result<Subscription> {
        let (subscription, released) = self.subscribe_inner(recipient).await?;

        let bus = self.clone();
        let recipient = recipient.to_string();
        let subscription_id = subscription.id;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    bus.release(&recipient, subscription_id).await;
                }
                _ = released.cancelled() => {
                    debug!("🔧 Watcher for subscription {} exiting", subscription_id);
                }
            }
        });

        Ok(subscription)
    }

    /// Drop whatever subscription `recipient` has. Returns whether one existed.
    #[instrument(level = "debug", skip(self))]
    pub async fn unsubscribe(&self, recipient: &str) -> bool {
        match self.delivery.remove(recipient).await {
            Some(subscriber) => {
                teardown(recipient, subscriber).await;
                true
            }
            None => {
                debug!("🔧 {} was not subscribed", recipient);
                false
            }
        }
    }

    /// Drop the subscription only if it is still `subscription_id`
    pub async fn release(&self, recipient: &str, subscription_id: u64) -> bool {
        match self.delivery.remove_if(recipient, subscription_id).await {
            Some(subscriber) => {
                teardown(recipient, subscriber).await;
                true
            }
            None => {
                debug!(
                    "🔧 Subscription {} for {} already gone",
                    subscription_id, recipient
                );
                false
            }
        }
    }

    /// Send `event` to `recipient`, locally if possible
    #[instrument(level = "debug", skip(self, event), fields(kind = event.kind()))]
    pub async fn publish(&self, recipient: &str, event: Event) -> Result<Delivery> {
        let start = Instant::now();

        let event = match self.delivery.sender_for(recipient).await {
            Some(sender) => match sender.send_timeout(event, self.config.send_timeout()).await {
                Ok(()) => {
                    debug!("✅ Delivered locally to {} in {:?}", recipient, start.elapsed());
                    return Ok(Delivery::Local);
                }
                Err(SendTimeoutError::Timeout(event)) => {
                    warn!(
                        "⚠️ Subscriber {} is not draining, dropped {}",
                        recipient, event
                    );
                    return Ok(Delivery::Dropped);
                }
                Err(SendTimeoutError::Closed(event)) => {
                    debug!("🔧 {} went away mid-publish, forwarding", recipient);
                    event
                }
            },
            None => event,
        };

        let bytes = Envelope::from_event(&event)?.to_bytes()?;
        self.transport
            .publish(&self.topic_for(recipient), bytes)
            .await
            .map_err(|e| {
                warn!("❌ Transport publish for {} failed: {}", recipient, e);
                e
            })?;

        debug!("✅ Forwarded {} to {} in {:?}", event, recipient, start.elapsed());
        Ok(Delivery::Remote)
    }

    /// Publish one event to many recipients concurrently
    ///
    /// Results come back in recipient order. One recipient failing does not
    /// affect the others.
    pub async fn publish_many(&self, recipients: &[String], event: &Event) -> Vec<Result<Delivery>> {
        join_all(
            recipients
                .iter()
                .map(|recipient| self.publish(recipient, event.clone())),
        )
        .await
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("transport", &self.transport)
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

async fn teardown(recipient: &str, subscriber: LocalSubscriber) {
    subscriber.released.cancel();
    if let Err(e) = subscriber.route.unsubscribe().await {
        warn!("⚠️ Failed to remove transport route for {}: {}", recipient, e);
    }
    debug!(
        "✅ Released subscription {} for {}",
        subscriber.subscription_id, recipient
    );
}

/// Live event stream for one recipient
///
/// Ends when the subscription is released, unsubscribed or superseded.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    recipient: String,
    stream: ReceiverStream<Event>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Next event, or `None` once the subscription has ended
    pub async fn recv(&mut self) -> Option<Event> {
        self.stream.next().await
    }
}

impl Stream for Subscription {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        Pin::new(&mut self.get_mut().stream).poll_next(cx)
    }
}

/// Transport-side route into one subscriber's channel
struct RouteHandler {
    recipient: String,
    registry: Arc<EventRegistry>,
    sender: mpsc::WeakSender<Event>,
    send_timeout: Duration,
}

#[async_trait]
impl InboundHandler for RouteHandler {
    async fn handle(&self, payload: Vec<u8>) {
        let event = match self.registry.decode_bytes(&payload) {
            Ok(event) => event,
            Err(DingilinkError::UnknownEventKind(kind)) => {
                warn!(
                    "⚠️ Dropping inbound event of unknown kind {} for {}",
                    kind, self.recipient
                );
                return;
            }
            Err(e) => {
                warn!("⚠️ Dropping undecodable event for {}: {}", self.recipient, e);
                return;
            }
        };

        let Some(sender) = self.sender.upgrade() else {
            debug!("🔧 Route for {} outlived its subscriber", self.recipient);
            return;
        };

        match sender.send_timeout(event, self.send_timeout).await {
            Ok(()) => debug!("✅ Delivered forwarded event to {}", self.recipient),
            Err(SendTimeoutError::Timeout(event)) => {
                warn!("⚠️ Subscriber {} is not draining, dropped {}", self.recipient, event)
            }
            Err(SendTimeoutError::Closed(_)) => {
                debug!("🔧 Subscriber {} closed before delivery", self.recipient)
            }
        }
    }
}
