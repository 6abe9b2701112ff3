//! Message variants
//!
//! A stored message row is flat: one type discriminant plus every column any
//! kind might use. [`Message::build`] turns such a row into a typed message.
//! The variant is derived on every read and never persisted, so a row that
//! was soft-deleted after it was first read comes back as
//! [`MessageContent::Deleted`] the next time.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use dingilink_common::{DingilinkError, Result};
use serde::{Deserialize, Serialize};

use crate::types::{ChatTarget, GeoPoint, GroupId, MessageId, UserId};

/// Stored type discriminant of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Audio,
    Video,
    Document,
    Location,
}

impl MessageKind {
    pub const ALL: [MessageKind; 6] = [
        MessageKind::Text,
        MessageKind::Image,
        MessageKind::Audio,
        MessageKind::Video,
        MessageKind::Document,
        MessageKind::Location,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Audio => "audio",
            MessageKind::Video => "video",
            MessageKind::Document => "document",
            MessageKind::Location => "location",
        }
    }

    /// Kinds whose payload is an uploaded media object
    pub fn is_media(self) -> bool {
        matches!(
            self,
            MessageKind::Image | MessageKind::Audio | MessageKind::Video | MessageKind::Document
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = DingilinkError;

    fn from_str(s: &str) -> Result<Self> {
        MessageKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DingilinkError::InvalidVariant(s.to_string()))
    }
}

/// A message row as the store returns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: Option<UserId>,
    pub group_id: Option<GroupId>,
    pub message_type: String,
    pub text_content: Option<String>,
    pub media: Option<String>,
    pub location: Option<GeoPoint>,
    pub reply_for_message_id: Option<MessageId>,
    pub sent_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<UserId>,
}

/// Where a message was sent; exactly one of recipient and group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conversation {
    Direct { recipient_id: UserId },
    Group { group_id: GroupId },
}

impl Conversation {
    pub fn recipient_id(self) -> Option<UserId> {
        match self {
            Conversation::Direct { recipient_id } => Some(recipient_id),
            Conversation::Group { .. } => None,
        }
    }

    pub fn group_id(self) -> Option<GroupId> {
        match self {
            Conversation::Direct { .. } => None,
            Conversation::Group { group_id } => Some(group_id),
        }
    }
}

/// Variant specific payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    Text {
        body: String,
    },
    Image {
        media: Option<String>,
        caption: Option<String>,
    },
    Audio {
        media: Option<String>,
        caption: Option<String>,
    },
    Video {
        media: Option<String>,
        caption: Option<String>,
    },
    Document {
        media: Option<String>,
        caption: Option<String>,
    },
    Location {
        point: Option<GeoPoint>,
        caption: Option<String>,
    },
    Deleted {
        deleted_by: Option<UserId>,
        deleted_at: DateTime<Utc>,
    },
}

/// A typed, read-only chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub conversation: Conversation,
    pub reply_to: Option<MessageId>,
    pub sent_at: DateTime<Utc>,
    pub content: MessageContent,
}

impl Message {
    /// Build a typed message from a stored row.
    ///
    /// A set deletion timestamp wins over the stored type: such rows always
    /// become [`MessageContent::Deleted`]. Otherwise the discriminant selects
    /// the variant and an unknown one is [`DingilinkError::InvalidVariant`].
    pub fn build(record: MessageRecord) -> Result<Self> {
        let conversation = match (record.recipient_id, record.group_id) {
            (Some(recipient_id), None) => Conversation::Direct { recipient_id },
            (None, Some(group_id)) => Conversation::Group { group_id },
            _ => {
                return Err(DingilinkError::Validation(format!(
                    "message {} must have exactly one of recipient or group",
                    record.id
                )))
            }
        };

        let content = match record.deleted_at {
            Some(deleted_at) => MessageContent::Deleted {
                deleted_by: record.deleted_by,
                deleted_at,
            },
            None => Self::content_for(&record)?,
        };

        Ok(Self {
            id: record.id,
            sender_id: record.sender_id,
            conversation,
            reply_to: record.reply_for_message_id,
            sent_at: record.sent_at,
            content,
        })
    }

    /// Only the discriminant is checked here. Columns a kind would normally
    /// carry may be missing on stored rows; they come back empty.
    fn content_for(record: &MessageRecord) -> Result<MessageContent> {
        let kind: MessageKind = record.message_type.parse()?;
        let caption = record.text_content.clone();
        let media = record.media.clone();

        let content = match kind {
            MessageKind::Text => MessageContent::Text {
                body: caption.unwrap_or_default(),
            },
            MessageKind::Image => MessageContent::Image { media, caption },
            MessageKind::Audio => MessageContent::Audio { media, caption },
            MessageKind::Video => MessageContent::Video { media, caption },
            MessageKind::Document => MessageContent::Document { media, caption },
            MessageKind::Location => MessageContent::Location {
                point: record.location,
                caption,
            },
        };

        Ok(content)
    }

    /// The discriminant of the built variant, `"deleted"` for deleted rows
    pub fn kind_name(&self) -> &'static str {
        match &self.content {
            MessageContent::Text { .. } => MessageKind::Text.as_str(),
            MessageContent::Image { .. } => MessageKind::Image.as_str(),
            MessageContent::Audio { .. } => MessageKind::Audio.as_str(),
            MessageContent::Video { .. } => MessageKind::Video.as_str(),
            MessageContent::Document { .. } => MessageKind::Document.as_str(),
            MessageContent::Location { .. } => MessageKind::Location.as_str(),
            MessageContent::Deleted { .. } => "deleted",
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self.content, MessageContent::Deleted { .. })
    }

    /// The chat this message belongs to, as seen by `viewer`.
    ///
    /// For direct messages that is the other party of the conversation.
    pub fn chat_for(&self, viewer: UserId) -> ChatTarget {
        match self.conversation {
            Conversation::Group { group_id } => ChatTarget::Group(group_id),
            Conversation::Direct { recipient_id } if recipient_id == viewer => {
                ChatTarget::Direct(self.sender_id)
            }
            Conversation::Direct { recipient_id } => ChatTarget::Direct(recipient_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn record(message_type: &str) -> MessageRecord {
        MessageRecord {
            id: MessageId(3),
            sender_id: UserId(5),
            recipient_id: Some(UserId(3)),
            group_id: None,
            message_type: message_type.to_string(),
            text_content: Some("hellooo !!!".to_string()),
            media: Some("uploads/abc.png".to_string()),
            location: Some(GeoPoint::new(6.92, 79.86)),
            reply_for_message_id: None,
            sent_at: Utc::now(),
            deleted_at: None,
            deleted_by: None,
        }
    }

    #[test]
    fn test_build_dispatches_on_type() {
        for kind in MessageKind::ALL {
            let message = Message::build(record(kind.as_str())).unwrap();
            assert_eq!(message.kind_name(), kind.as_str());
            assert_eq!(
                message.conversation,
                Conversation::Direct { recipient_id: UserId(3) }
            );
        }
    }

    #[test]
    fn test_deletion_overrides_type() {
        let deleted_at = Utc::now();
        for message_type in ["text", "image", "location", "no-such-type"] {
            let mut row = record(message_type);
            row.deleted_at = Some(deleted_at);
            row.deleted_by = Some(UserId(5));

            let message = Message::build(row).unwrap();
            assert!(message.is_deleted());
            assert_eq!(
                message.content,
                MessageContent::Deleted {
                    deleted_by: Some(UserId(5)),
                    deleted_at,
                }
            );
        }
    }

    #[test]
    fn test_unknown_type_is_invalid_variant() {
        let err = Message::build(record("sticker")).unwrap_err();
        assert_eq!(err, DingilinkError::InvalidVariant("sticker".to_string()));
    }

    #[test]
    fn test_missing_payload_builds_empty() {
        let mut row = record("video");
        row.media = None;
        row.text_content = None;
        assert_eq!(
            Message::build(row).unwrap().content,
            MessageContent::Video {
                media: None,
                caption: None
            }
        );

        let mut row = record("location");
        row.location = None;
        assert!(matches!(
            Message::build(row).unwrap().content,
            MessageContent::Location { point: None, .. }
        ));

        let mut row = record("text");
        row.text_content = None;
        assert_eq!(
            Message::build(row).unwrap().content,
            MessageContent::Text {
                body: String::new()
            }
        );
    }

    #[test]
    fn test_conversation_must_be_exclusive() {
        let mut row = record("text");
        row.group_id = Some(GroupId(1));
        assert!(matches!(Message::build(row), Err(DingilinkError::Validation(_))));

        let mut row = record("text");
        row.recipient_id = None;
        assert!(matches!(Message::build(row), Err(DingilinkError::Validation(_))));
    }

    #[test]
    fn test_group_conversation_is_carried_through() {
        let mut row = record("image");
        row.recipient_id = None;
        row.group_id = Some(GroupId(9));
        row.reply_for_message_id = Some(MessageId(1));

        let message = Message::build(row).unwrap();
        assert_eq!(message.conversation.group_id(), Some(GroupId(9)));
        assert_eq!(message.conversation.recipient_id(), None);
        assert_eq!(message.reply_to, Some(MessageId(1)));
    }

    #[test]
    fn test_chat_for_viewer() {
        let message = Message::build(record("text")).unwrap();
        // sender 5 -> recipient 3
        assert_eq!(message.chat_for(UserId(3)), ChatTarget::Direct(UserId(5)));
        assert_eq!(message.chat_for(UserId(5)), ChatTarget::Direct(UserId(3)));
    }
}
