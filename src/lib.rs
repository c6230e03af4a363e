//! Session Notifier - real-time WebSocket notifications for long-running
//! operations.
//!
//! Backend code publishes progress, status, result, error and log events
//! tagged with a session ID; every viewer connected under that session and
//! subscribed to the event's topic receives it immediately.
//!
//! # Architecture
//!
//! The server follows a publish/fan-out model:
//!
//! - **Publishers (Rust)**: call `send_*` on a [`NotificationManager`] handle
//! - **Viewers (WebSocket)**: connect with `?sessionId=..&subscribe=..`
//!
//! Key design principles:
//!
//! - Many connections may share one session; all of them receive its events
//! - Each connection filters by its own topic subscriptions
//! - Delivery is at-most-once and never blocks the publisher
//! - Each connection has a bounded outbound queue with an explicit
//!   slow-consumer policy
//! - Idle connections are pinged and evicted after the inactivity timeout
//!
//! # Quick Start
//!
//! ```no_run
//! use serde_json::json;
//! use session_notifier::{NotificationManager, ProgressUpdate, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = NotificationManager::from_env()?;
//!     manager.start().await?;
//!
//!     // ws://host:3001/?sessionId=job-1&subscribe=progress,result
//!     manager.send_progress(
//!         &ProgressUpdate::new("job-1")
//!             .with_operation("import")
//!             .with_progress(40),
//!     );
//!     manager.send_result("job-1", json!({"rows": 1200}), None);
//!
//!     manager.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`manager`] | [`NotificationManager`], registry, cleanup, stats |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | [`SessionId`] and [`ConnectionId`] |
//! | [`protocol`] | Wire messages, topics and handshake parsing |
//! | [`transport`] | [`Transport`] trait, WebSocket and in-memory transports |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// Only lifecycle and configuration calls return [`Result<T>`].
pub mod error;

/// Type-safe identifiers for sessions and connections.
pub mod identifiers;

/// Notification manager.
///
/// Use [`NotificationManager::builder()`] to create a configured instance.
pub mod manager;

/// JSON wire protocol.
///
/// Outbound notifications, inbound control messages and handshake
/// parameters.
pub mod protocol;

/// Socket abstraction and implementations.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Manager types
pub use manager::{
    Connection, ConnectionStats, HealthReport, HealthStatus, ManagerOptions, NotificationManager,
    NotificationManagerBuilder, SessionStats, StatsSnapshot, SweepReport,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionId, SessionId};

// Protocol types
pub use protocol::{
    Broadcast, ClientMessage, Handshake, NotificationMessage, ProgressStatus, ProgressUpdate,
    Topic, TopicSet,
};

// Transport types
pub use transport::{MemoryTransport, SlowConsumerPolicy, Transport, TransportEvent};
