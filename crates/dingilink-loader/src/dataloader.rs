//! Per-operation loader bundle
//!
//! Build one [`Dataloader`] per request. Its collectors batch every load
//! issued while resolving that request, and dropping it discards everything
//! it fetched.

use std::sync::Arc;

use dingilink_common::Result;
use dingilink_core::{ChatStore, Group, GroupId, GroupMember, LoaderConfig, Message, MessageId, User, UserId};

use crate::loaders::{
    GroupBatch, GroupLoader, GroupMembersBatch, GroupMembersLoader, MessageBatch, MessageLoader,
    UserBatch, UserLoader,
};

/// One batch collector per entity kind
#[derive(Clone)]
pub struct Dataloader {
    user: UserLoader,
    group: GroupLoader,
    group_members: GroupMembersLoader,
    message: MessageLoader,
}

impl Dataloader {
    pub fn new(store: Arc<dyn ChatStore>, config: &LoaderConfig) -> Self {
        Self {
            user: UserLoader::with_config(UserBatch::new(Arc::clone(&store)), config),
            group: GroupLoader::with_config(GroupBatch::new(Arc::clone(&store)), config),
            group_members: GroupMembersLoader::with_config(
                GroupMembersBatch::new(Arc::clone(&store)),
                config,
            ),
            message: MessageLoader::with_config(MessageBatch::new(store), config),
        }
    }

    /// Get a user by id
    pub async fn user(&self, id: UserId) -> Result<Option<User>> {
        self.user.load(id).await
    }

    /// Get a group by id
    pub async fn group(&self, id: GroupId) -> Result<Option<Group>> {
        self.group.load(id).await
    }

    /// Get the members of a group; unknown groups have no members
    pub async fn group_members(&self, id: GroupId) -> Result<Vec<GroupMember>> {
        Ok(self.group_members.load(id).await?.unwrap_or_default())
    }

    /// Get a message by id, built into its variant
    pub async fn message(&self, id: MessageId) -> Result<Option<Message>> {
        self.message.load(id).await
    }

    pub fn users(&self) -> &UserLoader {
        &self.user
    }

    pub fn groups(&self) -> &GroupLoader {
        &self.group
    }

    pub fn messages(&self) -> &MessageLoader {
        &self.message
    }
}
