//! Events delivered to connected clients
//!
//! Every payload type has a stable kind name that travels with it across the
//! distributed transport. [`Event`] is the closed set the bus carries.

use std::fmt;

use dingilink_core::{MessageId, UserId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A payload that can travel inside an envelope
pub trait EventPayload: Serialize + DeserializeOwned + Into<Event> + Send + 'static {
    /// Kind name written to the envelope; must be unique per payload type
    const KIND: &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageEventType {
    New,
    Deleted,
    Edited,
}

/// Something happened to a message the recipient can see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    #[serde(rename = "type")]
    pub event_type: MessageEventType,
    pub message_id: MessageId,
}

impl MessageEvent {
    pub fn new(message_id: MessageId) -> Self {
        Self {
            event_type: MessageEventType::New,
            message_id,
        }
    }

    pub fn deleted(message_id: MessageId) -> Self {
        Self {
            event_type: MessageEventType::Deleted,
            message_id,
        }
    }

    pub fn edited(message_id: MessageId) -> Self {
        Self {
            event_type: MessageEventType::Edited,
            message_id,
        }
    }
}

impl EventPayload for MessageEvent {
    const KIND: &'static str = "MessageEvent";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallEventType {
    Incoming,
    Declined,
    Ignored,
    Terminated,
    #[serde(rename = "ice_updated")]
    IceCandidatesUpdated,
}

/// Call signalling for one party of a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEvent {
    #[serde(rename = "type")]
    pub event_type: CallEventType,
    pub call_id: i64,
    pub actor_id: Option<UserId>,
}

impl EventPayload for CallEvent {
    const KIND: &'static str = "CallEvent";
}

/// Everything the event bus carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Message(MessageEvent),
    Call(CallEvent),
}

impl Event {
    /// Kind name of the wrapped payload
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Message(_) => MessageEvent::KIND,
            Event::Call(_) => CallEvent::KIND,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Message(event) => write!(f, "{:?} message {}", event.event_type, event.message_id),
            Event::Call(event) => write!(f, "{:?} call {}", event.event_type, event.call_id),
        }
    }
}

impl From<MessageEvent> for Event {
    fn from(event: MessageEvent) -> Self {
        Event::Message(event)
    }
}

impl From<CallEvent> for Event {
    fn from(event: CallEvent) -> Self {
        Event::Call(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_message_event_wire_shape() {
        let json = serde_json::to_value(MessageEvent::new(MessageId(3))).unwrap();
        assert_eq!(json, serde_json::json!({"type": "new", "messageId": 3}));
    }

    #[test]
    fn test_call_event_wire_shape() {
        let event = CallEvent {
            event_type: CallEventType::IceCandidatesUpdated,
            call_id: 8,
            actor_id: Some(UserId(2)),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "ice_updated", "callId": 8, "actorId": 2})
        );
    }

    #[test]
    fn test_event_kind() {
        assert_eq!(Event::from(MessageEvent::deleted(MessageId(1))).kind(), "MessageEvent");
        let call = CallEvent {
            event_type: CallEventType::Incoming,
            call_id: 1,
            actor_id: None,
        };
        assert_eq!(Event::from(call).kind(), "CallEvent");
    }
}
