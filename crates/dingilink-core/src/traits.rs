//! Core traits for Dingilink
//!
//! These are the store-facing seams the batching and pagination code is
//! written against. Persistence itself lives behind them; the query
//! definitions are owned by whoever implements the traits.

use async_trait::async_trait;
use dingilink_common::Result;

use crate::message::MessageRecord;
use crate::types::{ChatTarget, GeoPoint, Group, GroupId, GroupMember, MessageId, User, UserId};

/// Bulk user reads
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fetch every user whose id is in `ids`; unknown ids are simply missing
    async fn get_batched_users(&self, ids: &[UserId]) -> Result<Vec<User>>;
}

/// Bulk group reads
#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn get_batched_groups(&self, ids: &[GroupId]) -> Result<Vec<Group>>;

    /// Members of all groups in `ids`, flattened
    async fn get_batched_group_members(&self, ids: &[GroupId]) -> Result<Vec<GroupMember>>;
}

/// A message about to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub recipient_id: Option<UserId>,
    pub group_id: Option<GroupId>,
    pub message_type: String,
    pub text_content: Option<String>,
    pub media: Option<String>,
    pub location: Option<GeoPoint>,
    pub reply_for_message_id: Option<MessageId>,
}

/// Message reads and writes
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn get_batched_messages(&self, ids: &[MessageId]) -> Result<Vec<MessageRecord>>;

    async fn insert_message(&self, message: NewMessage) -> Result<MessageRecord>;
}

/// Ordered access to the history of one chat as seen by one viewer.
///
/// Ordering is descending by message id, newest first.
#[async_trait]
pub trait MessageHistory: Send + Sync {
    /// Up to `limit` messages strictly older than `before`, newest first.
    /// Without a cursor the newest `limit` messages are returned.
    async fn fetch_page(
        &self,
        target: ChatTarget,
        viewer: UserId,
        before: Option<MessageId>,
        limit: i64,
    ) -> Result<Vec<MessageRecord>>;

    /// Whether any message strictly older than `before_id` exists
    async fn has_older(&self, target: ChatTarget, viewer: UserId, before_id: MessageId) -> Result<bool>;

    /// Whether any message strictly newer than `after_id` exists
    async fn has_newer(&self, target: ChatTarget, viewer: UserId, after_id: MessageId) -> Result<bool>;
}

/// Everything the chat core needs from persistence
pub trait ChatStore: UserRepository + GroupRepository + MessageRepository + MessageHistory {}

impl<T> ChatStore for T where T: UserRepository + GroupRepository + MessageRepository + MessageHistory {}
