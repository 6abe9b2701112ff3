//! Event kind registry
//!
//! Maps envelope kind names to the function that rebuilds the concrete
//! payload. The registry is built once at startup, shared behind an `Arc`,
//! and never changes afterwards.

use std::collections::HashMap;
use std::fmt;

use dingilink_common::{DingilinkError, Result};
use serde_json::value::RawValue;
use tracing::debug;

use crate::envelope::Envelope;
use crate::event::{CallEvent, Event, EventPayload, MessageEvent};

type Decoder = fn(&RawValue) -> Result<Event>;

fn decode_as<T: EventPayload>(raw: &RawValue) -> Result<Event> {
    let payload: T = serde_json::from_str(raw.get())?;
    Ok(payload.into())
}

/// Immutable kind name -> decoder table
pub struct EventRegistry {
    decoders: HashMap<&'static str, Decoder>,
}

impl EventRegistry {
    pub fn builder() -> EventRegistryBuilder {
        EventRegistryBuilder::default()
    }

    /// Registry with every payload type this crate defines
    pub fn standard() -> Self {
        Self::builder()
            .register::<MessageEvent>()
            .register::<CallEvent>()
            .build()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.decoders.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.decoders.keys().copied()
    }

    /// Rebuild an event from its envelope
    pub fn decode(&self, envelope: &Envelope) -> Result<Event> {
        let decoder = self
            .decoders
            .get(envelope.kind.as_str())
            .ok_or_else(|| DingilinkError::UnknownEventKind(envelope.kind.clone()))?;
        decoder(&envelope.payload)
    }

    /// Rebuild an event from envelope bytes
    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<Event> {
        self.decode(&Envelope::from_bytes(bytes)?)
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.kinds().collect();
        kinds.sort_unstable();
        f.debug_struct("EventRegistry").field("kinds", &kinds).finish()
    }
}

#[derive(Default)]
pub struct EventRegistryBuilder {
    decoders: HashMap<&'static str, Decoder>,
}

impl EventRegistryBuilder {
    pub fn register<T: EventPayload>(mut self) -> Self {
        debug!("🔧 Registering event kind {}", T::KIND);
        self.decoders.insert(T::KIND, decode_as::<T>);
        self
    }

    pub fn build(self) -> EventRegistry {
        EventRegistry {
            decoders: self.decoders,
        }
    }
}
