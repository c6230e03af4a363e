//! WebSocket protocol message types.
//!
//! This module defines the JSON wire format between the notification
//! server and its viewers.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Handshake` | Client → Server | Upgrade URI query: session and topics |
//! | `ClientMessage` | Client → Server | subscribe / unsubscribe / ping |
//! | `NotificationMessage` | Server → Client | progress / status / result / error / log |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `client` | Inbound control messages |
//! | `handshake` | Upgrade request parameters |
//! | `message` | Outbound notifications and progress payloads |
//! | `topic` | Topics and subscription sets |

// ============================================================================
// Submodules
// ============================================================================

/// Inbound control messages.
pub mod client;

/// Upgrade request parameters.
pub mod handshake;

/// Outbound notification types.
pub mod message;

/// Topics and subscription sets.
pub mod topic;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::ClientMessage;
pub use handshake::Handshake;
pub use message::{
    Broadcast, DEFAULT_SOURCE, MANAGER_SOURCE, NotificationMessage, ProgressStatus, ProgressUpdate,
};
pub use topic::{Topic, TopicSet};
