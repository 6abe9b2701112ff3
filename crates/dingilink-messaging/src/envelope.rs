//! Wire envelope for cross-process events
//!
//! `{ "kind": "<name>", "payload": <payload json> }`. The payload is kept as
//! raw JSON until the receiving side has looked up the kind.

use dingilink_common::Result;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::event::{Event, EventPayload};

#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: String,
    pub payload: Box<RawValue>,
}

impl Envelope {
    /// Wrap one concrete payload
    pub fn wrap<T: EventPayload>(payload: &T) -> Result<Self> {
        Ok(Self {
            kind: T::KIND.to_string(),
            payload: serde_json::value::to_raw_value(payload)?,
        })
    }

    /// Wrap whichever payload `event` carries
    pub fn from_event(event: &Event) -> Result<Self> {
        match event {
            Event::Message(payload) => Self::wrap(payload),
            Event::Call(payload) => Self::wrap(payload),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
