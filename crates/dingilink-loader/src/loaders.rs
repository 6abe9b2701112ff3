//! Bulk fetch functions for each entity kind

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dingilink_common::{DingilinkError, Result};
use dingilink_core::{
    ChatStore, Group, GroupId, GroupMember, GroupRepository, Message, MessageId,
    MessageRepository, User, UserId, UserRepository,
};
use tracing::warn;

use crate::batch::{BatchCollector, BatchFn};

pub type UserLoader = BatchCollector<UserId, User, UserBatch>;
pub type GroupLoader = BatchCollector<GroupId, Group, GroupBatch>;
pub type GroupMembersLoader = BatchCollector<GroupId, Vec<GroupMember>, GroupMembersBatch>;
pub type MessageLoader = BatchCollector<MessageId, Message, MessageBatch>;

fn fetch_failure(kind: &str, err: DingilinkError) -> DingilinkError {
    if err.is_fetch_failure() {
        err
    } else {
        DingilinkError::fetch(kind, err)
    }
}

pub struct UserBatch {
    store: Arc<dyn ChatStore>,
}

impl UserBatch {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BatchFn<UserId, User> for UserBatch {
    fn kind(&self) -> &'static str {
        "user"
    }

    async fn fetch_many(&self, keys: &[UserId]) -> Result<HashMap<UserId, Result<User>>> {
        let users = self
            .store
            .get_batched_users(keys)
            .await
            .map_err(|e| fetch_failure(self.kind(), e))?;

        Ok(users.into_iter().map(|user| (user.id, Ok(user))).collect())
    }
}

pub struct GroupBatch {
    store: Arc<dyn ChatStore>,
}

impl GroupBatch {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BatchFn<GroupId, Group> for GroupBatch {
    fn kind(&self) -> &'static str {
        "group"
    }

    async fn fetch_many(&self, keys: &[GroupId]) -> Result<HashMap<GroupId, Result<Group>>> {
        let groups = self
            .store
            .get_batched_groups(keys)
            .await
            .map_err(|e| fetch_failure(self.kind(), e))?;

        Ok(groups.into_iter().map(|group| (group.id, Ok(group))).collect())
    }
}

/// Member lists keyed by group. A group nobody belongs to (or that does not
/// exist) resolves to an empty list rather than to absence.
pub struct GroupMembersBatch {
    store: Arc<dyn ChatStore>,
}

impl GroupMembersBatch {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BatchFn<GroupId, Vec<GroupMember>> for GroupMembersBatch {
    fn kind(&self) -> &'static str {
        "group_members"
    }

    async fn fetch_many(
        &self,
        keys: &[GroupId],
    ) -> Result<HashMap<GroupId, Result<Vec<GroupMember>>>> {
        let members = self
            .store
            .get_batched_group_members(keys)
            .await
            .map_err(|e| fetch_failure(self.kind(), e))?;

        let mut by_group: HashMap<GroupId, Vec<GroupMember>> =
            keys.iter().map(|id| (*id, Vec::new())).collect();
        for member in members {
            by_group.entry(member.group_id).or_default().push(member);
        }

        Ok(by_group
            .into_iter()
            .map(|(group_id, members)| (group_id, Ok(members)))
            .collect())
    }
}

/// Messages are built into their variants as they are fetched; a row that
/// does not build fails only its own key.
pub struct MessageBatch {
    store: Arc<dyn ChatStore>,
}

impl MessageBatch {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BatchFn<MessageId, Message> for MessageBatch {
    fn kind(&self) -> &'static str {
        "message"
    }

    async fn fetch_many(&self, keys: &[MessageId]) -> Result<HashMap<MessageId, Result<Message>>> {
        let records = self
            .store
            .get_batched_messages(keys)
            .await
            .map_err(|e| fetch_failure(self.kind(), e))?;

        Ok(records
            .into_iter()
            .map(|record| {
                let id = record.id;
                let built = Message::build(record);
                if let Err(err) = &built {
                    warn!("⚠️ Message {} could not be built: {}", id, err);
                }
                (id, built)
            })
            .collect())
    }
}
