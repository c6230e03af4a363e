//! WebSocket transport layer.
//!
//! This module abstracts one physical socket behind the [`Transport`] trait
//! so the manager never touches a WebSocket library directly.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                         ┌─────────────────┐
//! │  NotificationManager │                         │  Viewer         │
//! │                      │        WebSocket        │  (browser tab,  │
//! │  Listener → upgrade  │◄───────────────────────►│   CLI, ...)     │
//! │  → WsTransport       │     0.0.0.0:PORT        │                 │
//! └──────────────────────┘                         └─────────────────┘
//! ```
//!
//! Outbound: `Transport::send` → bounded `OutboundQueue` → writer task.
//! Inbound: read loop → [`TransportEvent`] → connection handler.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | tokio-tungstenite transport, writer task, read loop |
//! | `memory` | In-process transport |
//! | `queue` | Bounded outbound queue and slow-consumer policy |
//! | `server` | Listener and handshake upgrade |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket-backed transport.
pub mod connection;

/// In-process transport.
pub mod memory;

/// Bounded outbound queue.
pub mod queue;

/// Listener and handshake upgrade.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::WsTransport;
pub use memory::{Frame, MemoryTransport};
pub use queue::SlowConsumerPolicy;
pub use server::Listener;
pub use tokio_tungstenite::tungstenite::Utf8Bytes;

use crate::error::Result;

// ============================================================================
// Transport
// ============================================================================

/// One physical socket, as seen by the manager.
///
/// Every method must return without waiting on network I/O.
pub trait Transport: Send + Sync {
    /// Queues a serialized text frame.
    ///
    /// # Errors
    ///
    /// Any error means the frame was not queued and the connection should be
    /// dropped.
    fn send(&self, text: Utf8Bytes) -> Result<()>;

    /// Queues a protocol-level ping.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is closed.
    fn ping(&self) -> Result<()>;

    /// Closes the socket. Idempotent.
    fn close(&self);

    /// Returns `true` while frames can still be sent.
    fn is_open(&self) -> bool;
}

// ============================================================================
// TransportEvent
// ============================================================================

/// Something that happened on the inbound side of a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Text (or UTF-8 decoded binary) frame from the peer.
    Text(String),
    /// Answer to a keepalive ping.
    Pong,
    /// Peer closed the socket.
    Closed,
    /// Socket failed.
    Error(String),
}
