//! Notification manager and its parts.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | [`NotificationManager`]: lifecycle and outbound dispatch |
//! | `builder` | Validating builder |
//! | `options` | [`ManagerOptions`] and environment loading |
//! | `connection` | [`Connection`] state |
//! | `registry` | Session → connections map, fan-out and sweep |
//! | `handler` | Connection handling and inbound routing |
//! | `cleanup` | Periodic idle sweep |
//! | `stats` | Snapshot types |
//! | `health` | Health check |

// ============================================================================
// Submodules
// ============================================================================

/// Validating builder.
pub mod builder;

/// Periodic cleanup.
pub mod cleanup;

/// Per-socket state.
pub mod connection;

/// Lifecycle and dispatch.
pub mod core;

/// Connection handling and inbound routing.
pub mod handler;

/// Health check.
pub mod health;

/// Configuration.
pub mod options;

/// Connection registry.
pub mod registry;

/// Statistics.
pub mod stats;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::NotificationManagerBuilder;
pub use connection::Connection;
pub use core::NotificationManager;
pub use health::{HealthReport, HealthStatus};
pub use options::ManagerOptions;
pub use registry::{ConnectionRegistry, SweepReport};
pub use stats::{ConnectionStats, SessionStats, StatsSnapshot};
