//! Dingilink Messaging Library
//!
//! Version: 0.3.0
//! Purpose: Real-time event fan-out across server processes
//! License: Apache-2.0/MIT
//!
//! # Features
//! - Closed event set with stable kind names
//! - Typed envelopes and a constructed-once kind registry
//! - Per-recipient delivery registry with superseding subscriptions
//! - Event bus bridging local channels and a distributed transport
//! - In-process transport for tests and single-node runs

pub mod bus;
pub mod delivery;
pub mod envelope;
pub mod event;
pub mod kinds;
pub mod transport;

pub use bus::{Delivery, EventBus, Subscription};
pub use delivery::{DeliveryRegistry, LocalSubscriber};
pub use envelope::Envelope;
pub use event::{CallEvent, CallEventType, Event, EventPayload, MessageEvent, MessageEventType};
pub use kinds::{EventRegistry, EventRegistryBuilder};
pub use transport::{InMemoryTransport, InboundHandler, Transport, TransportSubscription};
