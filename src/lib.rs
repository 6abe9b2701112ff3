// =============================================================================
// Dingilink Chat Server - Library Crate
// =============================================================================
//
// Project: Dingilink - request batching and real-time event fan-out
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   Wires the loader and messaging crates into the message service used by
//   the API layer: history pages, message sends with event fan-out, and
//   per-user event subscriptions.
//
// =============================================================================

pub mod logging;
pub mod service;

// Re-export common types
pub use tokio;
pub use tracing;

// Re-export workspace crates
pub use dingilink_common as common;
pub use dingilink_core as core;
pub use dingilink_loader as loader;
pub use dingilink_messaging as messaging;

pub use dingilink_common::{DingilinkError, Result};
pub use dingilink_core::ServerConfig;
pub use service::{message_topic, GetMessagesInput, MessageService, SendMessageInput};
