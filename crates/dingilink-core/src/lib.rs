//! Dingilink Core Library
//!
//! Version: 0.3.0
//!
//! Fundamental types shared by the batching and messaging crates.
//!
//! # Features
//! - Identifier newtypes and chat targets
//! - Message variants built from stored rows
//! - Keyset pagination over chat history
//! - Repository traits for the persistence layer
//! - Configuration loading
//! - An in-memory store for tests and local runs
//!
//! # Examples
//! ```rust
//! use dingilink_core::{ChatTarget, ServerConfig};
//!
//! let config = ServerConfig::default();
//! assert!(config.validate().is_ok());
//!
//! let chat: ChatTarget = "group_12".parse().unwrap();
//! assert_eq!(chat.to_string(), "group_12");
//! ```

pub mod config;
pub mod memory;
pub mod message;
pub mod pagination;
pub mod traits;
pub mod types;

pub use config::{LoaderConfig, LoggingConfig, MessagingConfig, PaginationConfig, ServerConfig};
pub use dingilink_common::{DingilinkError, Result};
pub use memory::MemoryStore;
pub use message::{Conversation, Message, MessageContent, MessageKind, MessageRecord};
pub use pagination::{paginate, paginate_messages, Cursor, Edge, Page, PageInfo, PageRequest};
pub use traits::{
    ChatStore, GroupRepository, MessageHistory, MessageRepository, NewMessage, UserRepository,
};
pub use types::{ChatTarget, GeoPoint, Group, GroupId, GroupMember, MessageId, User, UserId};
