//! In-memory registry of connections keyed by session.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │           ConnectionRegistry             │
//! │  ┌────────────────────────────────────┐  │
//! │  │ "job-1"   → [Connection, Connection]│  │
//! │  │ "job-2"   → [Connection]            │  │
//! │  │ "default" → [Connection]            │  │
//! │  └────────────────────────────────────┘  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! A session key exists only while it has at least one connection. All
//! mutation happens under one write lock; fan-out and sweeps work on a
//! snapshot taken under the read lock, so transports are never called while
//! the map is locked.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::identifiers::{ConnectionId, SessionId};
use crate::protocol::{Topic, TopicSet};
use crate::transport::Utf8Bytes;

use super::connection::Connection;
use super::stats::{ConnectionStats, SessionStats};

// ============================================================================
// SweepReport
// ============================================================================

/// Outcome of one cleanup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Connections closed and removed.
    pub evicted: usize,
    /// Connections that were sent a keepalive ping.
    pub pinged: usize,
}

// ============================================================================
// ConnectionRegistry
// ============================================================================

/// Map from session to its live connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: RwLock<FxHashMap<SessionId, Vec<Arc<Connection>>>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection under its session, creating the key if needed.
    pub fn insert(&self, connection: Arc<Connection>) {
        self.sessions
            .write()
            .entry(connection.session_id().clone())
            .or_default()
            .push(connection);
    }

    /// Removes one connection; drops the session key when it was the last.
    pub fn remove(&self, session_id: &str, id: ConnectionId) -> Option<Arc<Connection>> {
        let mut sessions = self.sessions.write();
        let connections = sessions.get_mut(session_id)?;

        let index = connections.iter().position(|c| c.id() == id)?;
        let removed = connections.swap_remove(index);

        if connections.is_empty() {
            sessions.remove(session_id);
        }

        Some(removed)
    }

    /// Returns `true` if the session has at least one connection.
    #[must_use]
    pub fn contains_session(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    /// Returns a snapshot of a session's connections.
    #[must_use]
    pub fn connections(&self, session_id: &str) -> Vec<Arc<Connection>> {
        self.sessions
            .read()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns a snapshot of all session keys.
    #[must_use]
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.read().keys().cloned().collect()
    }

    /// Returns the number of sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns the number of connections across all sessions.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.sessions.read().values().map(Vec::len).sum()
    }

    /// Removes and returns every connection.
    pub fn drain(&self) -> Vec<Arc<Connection>> {
        self.sessions
            .write()
            .drain()
            .flat_map(|(_, connections)| connections)
            .collect()
    }

    /// Sends a serialized frame to every open connection of a session that
    /// subscribes to `topic`.
    ///
    /// Connections whose send fails are closed and removed. Returns the
    /// number of connections the frame was queued for.
    pub fn broadcast(&self, session_id: &str, topic: Topic, payload: &Utf8Bytes) -> usize {
        let recipients = self.connections(session_id);
        if recipients.is_empty() {
            return 0;
        }

        let mut delivered = 0;
        let mut failed = Vec::new();

        for connection in &recipients {
            if !connection.is_subscribed(topic) || !connection.is_open() {
                continue;
            }

            match connection.send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        session_id,
                        connection_id = %connection.id(),
                        error = %e,
                        "Send failed, dropping connection"
                    );
                    failed.push(Arc::clone(connection));
                }
            }
        }

        for connection in failed {
            self.evict(&connection);
        }

        delivered
    }

    /// Evicts idle or closed connections and pings the rest.
    ///
    /// A connection idle for longer than `inactivity_timeout` at `now`, or
    /// whose transport is already closed, is removed and then closed. The
    /// map is only locked for the snapshot and the removals; transports are
    /// never called while it is held.
    pub fn sweep(&self, now: Instant, inactivity_timeout: Duration) -> SweepReport {
        let snapshot: Vec<Arc<Connection>> = self
            .sessions
            .read()
            .values()
            .flat_map(|connections| connections.iter().cloned())
            .collect();

        let mut report = SweepReport::default();

        for connection in snapshot {
            let idle = connection.idle_for(now);

            if idle > inactivity_timeout || !connection.is_open() {
                debug!(
                    session_id = %connection.session_id(),
                    connection_id = %connection.id(),
                    idle_ms = idle.as_millis() as u64,
                    "Evicting inactive connection"
                );
                self.evict(&connection);
                report.evicted += 1;
                continue;
            }

            match connection.ping() {
                Ok(()) => report.pinged += 1,
                Err(e) => {
                    debug!(
                        session_id = %connection.session_id(),
                        connection_id = %connection.id(),
                        error = %e,
                        "Ping failed"
                    );
                    self.evict(&connection);
                    report.evicted += 1;
                }
            }
        }

        report
    }

    fn evict(&self, connection: &Connection) {
        self.remove(connection.session_id().as_str(), connection.id());
        connection.close();
    }

    /// Builds per-session statistics sorted by session ID.
    #[must_use]
    pub fn session_stats(&self, now: Instant) -> Vec<SessionStats> {
        let sessions = self.sessions.read();

        let mut stats: Vec<SessionStats> = sessions
            .iter()
            .map(|(session_id, connections)| {
                let mut union = TopicSet::new();
                let connections: Vec<ConnectionStats> = connections
                    .iter()
                    .map(|connection| {
                        let subscriptions = connection.subscriptions();
                        union.union_with(&subscriptions);
                        ConnectionStats {
                            connection_id: connection.id(),
                            subscriptions,
                            idle_ms: connection.idle_for(now).as_millis() as u64,
                        }
                    })
                    .collect();

                SessionStats {
                    session_id: session_id.clone(),
                    connection_count: connections.len(),
                    subscriptions: union,
                    connections,
                }
            })
            .collect();

        stats.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        stats
    }
}

// ============================================================================
// Tests
// ============================================================================
