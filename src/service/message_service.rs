//! Message Service
//!
//! Version: 0.3.0
//! Purpose: Chat history, message sends and per-user event streams
//! License: Apache-2.0/MIT
//!
//! Sends persist through the repository, then fan a `MessageEvent` out to
//! every user who can see the message. Fan-out runs on its own task so a
//! slow recipient never delays the sender's response.

use std::sync::Arc;
use std::time::Instant;

use dingilink_common::{DingilinkError, Result};
use dingilink_core::{
    paginate_messages, ChatStore, ChatTarget, Conversation, Cursor, GeoPoint, GroupId, Message,
    MessageId, MessageKind, NewMessage, Page, PageRequest, ServerConfig, UserId,
};
use dingilink_loader::Dataloader;
use dingilink_messaging::{Event, EventBus, MessageEvent, Subscription};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Transport topic carrying `user_id`'s message events
pub fn message_topic(prefix: &str, user_id: UserId) -> String {
    format!("{}_{}", prefix, message_events_key(user_id))
}

fn message_events_key(user_id: UserId) -> String {
    format!("{}.message_events", user_id)
}

/// History query arguments
#[derive(Debug, Clone, Default)]
pub struct GetMessagesInput {
    /// Page size; the configured default when absent
    pub last: Option<i64>,
    /// Cursor of the oldest message already seen
    pub before: Option<String>,
}

/// A new message from the calling user
#[derive(Debug, Clone, Default)]
pub struct SendMessageInput {
    pub user_id: Option<UserId>,
    pub group_id: Option<GroupId>,
    pub message_type: String,
    pub text_content: Option<String>,
    pub media: Option<String>,
    pub location: Option<GeoPoint>,
    pub reply_for_message_id: Option<MessageId>,
}

impl SendMessageInput {
    fn validate(&self) -> Result<MessageKind> {
        if self.user_id.is_some() == self.group_id.is_some() {
            return Err(DingilinkError::Validation(
                "exactly one of user id or group id is required".to_string(),
            ));
        }

        let kind: MessageKind = self.message_type.parse().map_err(|_| {
            DingilinkError::Validation(format!(
                "message type must be one of {}",
                MessageKind::ALL.map(MessageKind::as_str).join(", ")
            ))
        })?;

        match kind {
            MessageKind::Text => {
                if self.text_content.as_deref().map_or(true, |text| text.trim().is_empty()) {
                    return Err(DingilinkError::Validation(
                        "text messages require text content".to_string(),
                    ));
                }
            }
            MessageKind::Location => match &self.location {
                Some(point) => point.validate()?,
                None => {
                    return Err(DingilinkError::Validation(
                        "location messages require a location".to_string(),
                    ))
                }
            },
            _ if kind.is_media() => {
                if self.media.as_deref().map_or(true, str::is_empty) {
                    return Err(DingilinkError::Validation(format!(
                        "{} messages require media",
                        kind
                    )));
                }
            }
            _ => {}
        }

        Ok(kind)
    }
}

#[derive(Clone)]
pub struct MessageService {
    store: Arc<dyn ChatStore>,
    bus: EventBus,
    config: ServerConfig,
}

impl MessageService {
    pub fn new(store: Arc<dyn ChatStore>, bus: EventBus, config: ServerConfig) -> Self {
        Self { store, bus, config }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// One page of a chat's history as seen by `viewer`, newest first
    #[instrument(level = "debug", skip(self, input))]
    pub async fn get_messages(
        &self,
        viewer: UserId,
        chat_id: &str,
        input: GetMessagesInput,
    ) -> Result<Page<Message>> {
        let start = Instant::now();
        let target: ChatTarget = chat_id.parse()?;

        let mut request = PageRequest::new(target, viewer)
            .limit(input.last.unwrap_or(self.config.pagination.default_limit));
        if let Some(raw) = input.before.as_deref() {
            request = request.before(Cursor::parse(raw)?);
        }

        let page = paginate_messages(self.store.as_ref(), request).await?;
        debug!(
            "✅ {} messages of {} for {} in {:?}",
            page.len(),
            target,
            viewer,
            start.elapsed()
        );
        Ok(page)
    }

    /// Persist a message and notify everyone who can see it
    #[instrument(level = "debug", skip(self, input))]
    pub async fn send_message(&self, sender: UserId, input: SendMessageInput) -> Result<Message> {
        let start = Instant::now();
        let kind = input.validate()?;

        let record = self
            .store
            .insert_message(NewMessage {
                sender_id: sender,
                recipient_id: input.user_id,
                group_id: input.group_id,
                message_type: kind.as_str().to_string(),
                text_content: input.text_content,
                media: input.media,
                location: input.location,
                reply_for_message_id: input.reply_for_message_id,
            })
            .await?;
        let message = Message::build(record)?;

        let service = self.clone();
        let conversation = message.conversation;
        let event = Event::from(MessageEvent::new(message.id));
        tokio::spawn(async move { service.fan_out(conversation, event).await });

        info!(
            "✅ {} sent {} message {} in {:?}",
            sender,
            kind,
            message.id,
            start.elapsed()
        );
        Ok(message)
    }

    /// Live message events for `user` until `token` is cancelled
    pub async fn subscribe_message_events(
        &self,
        user: UserId,
        token: CancellationToken,
    ) -> Result<Subscription> {
        self.bus
            .subscribe_until(&message_events_key(user), token)
            .await
    }

    async fn fan_out(&self, conversation: Conversation, event: Event) {
        let recipients = match conversation {
            Conversation::Direct { recipient_id } => vec![recipient_id],
            Conversation::Group { group_id } => {
                let loader = Dataloader::new(Arc::clone(&self.store), &self.config.loader);
                match loader.group_members(group_id).await {
                    Ok(members) => members.into_iter().map(|member| member.user_id).collect(),
                    Err(e) => {
                        warn!("❌ Could not load members of group {}: {}", group_id, e);
                        return;
                    }
                }
            }
        };

        let keys: Vec<String> = recipients.iter().copied().map(message_events_key).collect();
        let results = self.bus.publish_many(&keys, &event).await;
        for (recipient, result) in recipients.iter().zip(results) {
            if let Err(e) = result {
                warn!("⚠️ Failed to notify {} of {}: {}", recipient, event, e);
            }
        }
        debug!("✅ Fanned {} out to {} recipients", event, recipients.len());
    }
}
