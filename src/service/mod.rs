//! Application services

mod message_service;

pub use message_service::{message_topic, GetMessagesInput, MessageService, SendMessageInput};
