//! Error types for Dingilink
//!
//! This module defines the error taxonomy shared by every Dingilink crate.
//! Absence of an entity is never represented here: loaders return `None`
//! for ids the store does not know about.

use std::fmt::Display;

use thiserror::Error;

/// Dingilink error types
///
/// The type is `Clone` so that one failed bulk fetch can be handed to every
/// caller waiting on the same batch window.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DingilinkError {
    /// A bulk read against the store failed
    #[error("Fetch failure for {kind}: {message}")]
    FetchFailure { kind: String, message: String },

    /// A stored record carries a type discriminant no variant matches
    #[error("Invalid message type: {0}")]
    InvalidVariant(String),

    /// A pagination cursor could not be parsed
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// A chat identifier could not be parsed
    #[error("Invalid chat id: {0}")]
    InvalidChatId(String),

    /// Input validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// No reconstruction function is registered for an inbound envelope
    #[error("Unknown event kind: {0}")]
    UnknownEventKind(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Distributed transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DingilinkError {
    /// Wrap a store error as a fetch failure for the given entity kind
    pub fn fetch(kind: impl Into<String>, err: impl Display) -> Self {
        DingilinkError::FetchFailure {
            kind: kind.into(),
            message: err.to_string(),
        }
    }

    /// Whether this error came from a failed bulk read
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, DingilinkError::FetchFailure { .. })
    }
}

/// Result type for Dingilink operations
pub type Result<T> = std::result::Result<T, DingilinkError>;

impl From<serde_json::Error> for DingilinkError {
    fn from(err: serde_json::Error) -> Self {
        DingilinkError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_error_display() {
        let err = DingilinkError::fetch("user", "connection reset");
        assert_eq!(err.to_string(), "Fetch failure for user: connection reset");
        assert!(err.is_fetch_failure());

        let err = DingilinkError::InvalidVariant("sticker".to_string());
        assert_eq!(err.to_string(), "Invalid message type: sticker");
        assert!(!err.is_fetch_failure());

        let err = DingilinkError::InvalidCursor("abc".to_string());
        assert_eq!(err.to_string(), "Invalid cursor: abc");

        let err = DingilinkError::UnknownEventKind("PresenceEvent".to_string());
        assert_eq!(err.to_string(), "Unknown event kind: PresenceEvent");
    }

    #[test]
    fn test_error_conversion_from_serde() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: DingilinkError = json_err.into();
        assert!(err.to_string().contains("Serialization error"));
    }

    #[test]
    fn test_fetch_failure_is_shareable() {
        let err = DingilinkError::fetch("message", "timeout");
        let copies: Vec<_> = (0..3).map(|_| err.clone()).collect();
        assert!(copies.iter().all(|e| *e == err));
    }
}
