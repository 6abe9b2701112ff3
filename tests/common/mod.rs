//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use dingilink::core::{
    ChatStore, Group, GroupId, GroupMember, MemoryStore, MessageId, MessageRecord, ServerConfig,
    User, UserId,
};
use dingilink::messaging::{EventBus, EventRegistry, InMemoryTransport};
use dingilink::MessageService;

pub fn user(id: i64) -> User {
    User {
        id: UserId(id),
        username: format!("user{id}"),
        email: format!("user{id}@example.com"),
        name: format!("User {id}"),
        bio: None,
        image: None,
        online: true,
        friend_count: 0,
    }
}

pub fn text_row(id: i64, sender: i64, recipient: i64) -> MessageRecord {
    MessageRecord {
        id: MessageId(id),
        sender_id: UserId(sender),
        recipient_id: Some(UserId(recipient)),
        group_id: None,
        message_type: "text".to_string(),
        text_content: Some(format!("message {id}")),
        media: None,
        location: None,
        reply_for_message_id: None,
        sent_at: Utc::now(),
        deleted_at: None,
        deleted_by: None,
    }
}

/// Users 1..=users, and group `group_id` owned by user 1 with the given members
pub async fn seeded_store(users: i64, group_id: i64, members: &[i64]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for id in 1..=users {
        store.insert_user(user(id)).await;
    }
    store
        .insert_group(Group {
            id: GroupId(group_id),
            name: format!("group {group_id}"),
            description: None,
            image: None,
            created_by: UserId(1),
        })
        .await;
    for (index, member) in members.iter().enumerate() {
        store
            .add_member(GroupMember {
                id: index as i64 + 1,
                group_id: GroupId(group_id),
                user_id: UserId(*member),
                is_admin: *member == 1,
                is_owner: *member == 1,
                joined_at: Utc::now(),
            })
            .await;
    }
    store
}

pub fn bus_over(transport: &InMemoryTransport, config: &ServerConfig) -> EventBus {
    EventBus::new(
        Arc::new(transport.clone()),
        Arc::new(EventRegistry::standard()),
        config.messaging.clone(),
    )
}

pub fn service_over(store: Arc<MemoryStore>, transport: &InMemoryTransport) -> MessageService {
    let config = ServerConfig::default();
    let store: Arc<dyn ChatStore> = store;
    MessageService::new(store, bus_over(transport, &config), config)
}
