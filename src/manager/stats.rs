//! Point-in-time statistics.
//!
//! Serializes in camelCase so the snapshot can be returned verbatim from an
//! HTTP or tool endpoint.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;

use crate::identifiers::{ConnectionId, SessionId};
use crate::protocol::TopicSet;

// ============================================================================
// StatsSnapshot
// ============================================================================

/// Server-wide statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Whether the listening endpoint is up.
    pub is_running: bool,
    /// Bound port while running, configured port otherwise.
    pub port: u16,
    /// Connections across all sessions.
    pub total_connections: usize,
    /// Sessions with at least one connection.
    pub session_count: usize,
    /// Per-session breakdown, sorted by session ID.
    pub sessions: Vec<SessionStats>,
}

impl StatsSnapshot {
    /// Looks up one session's entry.
    #[must_use]
    pub fn session(&self, session_id: &str) -> Option<&SessionStats> {
        self.sessions
            .iter()
            .find(|s| s.session_id.as_str() == session_id)
    }
}

// ============================================================================
// SessionStats
// ============================================================================

/// Statistics for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Session key.
    pub session_id: SessionId,
    /// Number of connections.
    pub connection_count: usize,
    /// Union of all connections' subscriptions.
    pub subscriptions: TopicSet,
    /// Per-connection detail.
    pub connections: Vec<ConnectionStats>,
}

// ============================================================================
// ConnectionStats
// ============================================================================

/// Statistics for one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStats {
    /// Server-assigned connection ID.
    pub connection_id: ConnectionId,
    /// Topics this connection receives.
    pub subscriptions: TopicSet,
    /// Milliseconds since the last inbound message or pong.
    pub idle_ms: u64,
}

// ============================================================================
// Tests
// ============================================================================
