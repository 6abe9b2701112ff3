//! In-memory chat store
//!
//! A [`ChatStore`] backed by ordered maps. It records the key list of every
//! bulk read so batching behaviour can be observed, and can be told to fail
//! reads to exercise error paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dingilink_common::{DingilinkError, Result};
use tokio::sync::RwLock;

use crate::message::MessageRecord;
use crate::traits::{GroupRepository, MessageHistory, MessageRepository, NewMessage, UserRepository};
use crate::types::{ChatTarget, Group, GroupId, GroupMember, MessageId, User, UserId};

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<UserId, User>,
    groups: BTreeMap<GroupId, Group>,
    members: Vec<GroupMember>,
    messages: BTreeMap<MessageId, MessageRecord>,
}

/// In-memory [`ChatStore`](crate::traits::ChatStore)
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    batch_calls: RwLock<HashMap<&'static str, Vec<Vec<i64>>>>,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.state.write().await.users.insert(user.id, user);
    }

    pub async fn insert_group(&self, group: Group) {
        self.state.write().await.groups.insert(group.id, group);
    }

    pub async fn add_member(&self, member: GroupMember) {
        self.state.write().await.members.push(member);
    }

    /// Store a raw row as-is, overwriting any row with the same id
    pub async fn insert_record(&self, record: MessageRecord) {
        self.state.write().await.messages.insert(record.id, record);
    }

    /// Soft-delete a message
    pub async fn delete_message(&self, id: MessageId, deleted_by: UserId) -> Result<()> {
        let mut state = self.state.write().await;
        let record = state
            .messages
            .get_mut(&id)
            .ok_or_else(|| DingilinkError::Validation(format!("no message {}", id)))?;
        record.deleted_at = Some(Utc::now());
        record.deleted_by = Some(deleted_by);
        Ok(())
    }

    /// Make every read fail until switched back
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Key lists of every bulk read of `kind` (`user`, `group`,
    /// `group_members`, `message`), each sorted
    pub async fn batch_calls(&self, kind: &str) -> Vec<Vec<i64>> {
        self.batch_calls
            .read()
            .await
            .get(kind)
            .cloned()
            .unwrap_or_default()
    }

    async fn record_batch(&self, kind: &'static str, ids: impl Iterator<Item = i64>) -> Result<()> {
        let mut ids: Vec<i64> = ids.collect();
        ids.sort_unstable();
        self.batch_calls.write().await.entry(kind).or_default().push(ids);
        self.check_reads(kind)
    }

    fn check_reads(&self, what: &str) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DingilinkError::fetch(what, "store unavailable"));
        }
        Ok(())
    }

    fn visible(state: &State, record: &MessageRecord, target: ChatTarget, viewer: UserId) -> bool {
        match target {
            ChatTarget::Direct(other) => {
                (record.sender_id == viewer && record.recipient_id == Some(other))
                    || (record.sender_id == other && record.recipient_id == Some(viewer))
            }
            ChatTarget::Group(group_id) => {
                record.group_id == Some(group_id)
                    && state
                        .members
                        .iter()
                        .any(|m| m.group_id == group_id && m.user_id == viewer)
            }
        }
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get_batched_users(&self, ids: &[UserId]) -> Result<Vec<User>> {
        self.record_batch("user", ids.iter().map(|id| id.0)).await?;
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.users.get(id).cloned()).collect())
    }
}

#[async_trait]
impl GroupRepository for MemoryStore {
    async fn get_batched_groups(&self, ids: &[GroupId]) -> Result<Vec<Group>> {
        self.record_batch("group", ids.iter().map(|id| id.0)).await?;
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.groups.get(id).cloned()).collect())
    }

    async fn get_batched_group_members(&self, ids: &[GroupId]) -> Result<Vec<GroupMember>> {
        self.record_batch("group_members", ids.iter().map(|id| id.0)).await?;
        let state = self.state.read().await;
        Ok(state
            .members
            .iter()
            .filter(|m| ids.contains(&m.group_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn get_batched_messages(&self, ids: &[MessageId]) -> Result<Vec<MessageRecord>> {
        self.record_batch("message", ids.iter().map(|id| id.0)).await?;
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.messages.get(id).cloned()).collect())
    }

    async fn insert_message(&self, message: NewMessage) -> Result<MessageRecord> {
        let mut state = self.state.write().await;
        let id = state
            .messages
            .keys()
            .next_back()
            .map_or(MessageId(1), |last| MessageId(last.0 + 1));

        let record = MessageRecord {
            id,
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            group_id: message.group_id,
            message_type: message.message_type,
            text_content: message.text_content,
            media: message.media,
            location: message.location,
            reply_for_message_id: message.reply_for_message_id,
            sent_at: Utc::now(),
            deleted_at: None,
            deleted_by: None,
        };
        state.messages.insert(id, record.clone());
        Ok(record)
    }
}

#[async_trait]
impl MessageHistory for MemoryStore {
    async fn fetch_page(
        &self,
        target: ChatTarget,
        viewer: UserId,
        before: Option<MessageId>,
        limit: i64,
    ) -> Result<Vec<MessageRecord>> {
        self.check_reads("message_history")?;
        let state = self.state.read().await;
        let upper = before.map_or(i64::MAX, |id| id.0);

        Ok(state
            .messages
            .range(..MessageId(upper))
            .rev()
            .map(|(_, record)| record)
            .filter(|record| Self::visible(&state, record, target, viewer))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn has_older(&self, target: ChatTarget, viewer: UserId, before_id: MessageId) -> Result<bool> {
        self.check_reads("message_history")?;
        let state = self.state.read().await;
        Ok(state
            .messages
            .range(..before_id)
            .any(|(_, record)| Self::visible(&state, record, target, viewer)))
    }

    async fn has_newer(&self, target: ChatTarget, viewer: UserId, after_id: MessageId) -> Result<bool> {
        self.check_reads("message_history")?;
        let state = self.state.read().await;
        Ok(state
            .messages
            .range(MessageId(after_id.0.saturating_add(1))..)
            .any(|(_, record)| Self::visible(&state, record, target, viewer)))
    }
}
