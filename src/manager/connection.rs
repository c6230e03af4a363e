//! One registered socket bound to one session.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::Result;
use crate::identifiers::{ConnectionId, SessionId};
use crate::protocol::{Topic, TopicSet};
use crate::transport::{Transport, Utf8Bytes};

// ============================================================================
// Connection
// ============================================================================

/// A live socket registered under a session.
///
/// The session never changes after the handshake; subscriptions and the
/// activity timestamp do.
pub struct Connection {
    /// Unique per socket.
    id: ConnectionId,
    /// Session this connection belongs to.
    session_id: SessionId,
    /// Topics delivered to this connection.
    subscriptions: Mutex<TopicSet>,
    /// Last inbound message or pong.
    last_activity: Mutex<Instant>,
    /// Exclusively owned socket.
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("session_id", &self.session_id)
            .field("subscriptions", &*self.subscriptions.lock())
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Creates a connection with fresh activity.
    pub(crate) fn new(
        session_id: SessionId,
        subscriptions: TopicSet,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            session_id,
            subscriptions: Mutex::new(subscriptions),
            last_activity: Mutex::new(Instant::now()),
            transport,
        }
    }

    /// Returns the connection ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the session ID.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Returns a copy of the current subscriptions.
    #[must_use]
    pub fn subscriptions(&self) -> TopicSet {
        self.subscriptions.lock().clone()
    }

    /// Returns `true` if `topic` is delivered to this connection.
    #[must_use]
    pub fn is_subscribed(&self, topic: Topic) -> bool {
        self.subscriptions.lock().contains(topic)
    }

    /// Adds topics and returns the resulting set.
    pub fn subscribe(&self, topics: &[Topic]) -> TopicSet {
        let mut subscriptions = self.subscriptions.lock();
        subscriptions.extend(topics.iter().copied());
        subscriptions.clone()
    }

    /// Removes topics and returns the resulting set.
    pub fn unsubscribe(&self, topics: &[Topic]) -> TopicSet {
        let mut subscriptions = self.subscriptions.lock();
        for topic in topics {
            subscriptions.remove(*topic);
        }
        subscriptions.clone()
    }

    /// Records activity now.
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Returns the time of the last activity.
    #[must_use]
    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock()
    }

    /// Returns how long the connection has been idle at `now`.
    #[must_use]
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity())
    }

    /// Returns `true` while the transport is open.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Queues a serialized frame.
    pub(crate) fn send(&self, payload: Utf8Bytes) -> Result<()> {
        self.transport.send(payload)
    }

    /// Queues a keepalive ping.
    pub(crate) fn ping(&self) -> Result<()> {
        self.transport.ping()
    }

    /// Closes the transport.
    pub(crate) fn close(&self) {
        self.transport.close();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::MemoryTransport;

    fn connection(subscriptions: TopicSet) -> Connection {
        Connection::new("s1".into(), subscriptions, Arc::new(MemoryTransport::new()))
    }

    #[test]
    fn test_subscribe_unions() {
        let conn = connection(TopicSet::handshake_default());
        let after = conn.subscribe(&[Topic::Result, Topic::Status]);

        assert_eq!(after.len(), 3);
        assert!(conn.is_subscribed(Topic::Result));
    }

    #[test]
    fn test_unsubscribe_removes() {
        let conn = connection(TopicSet::handshake_default());
        let after = conn.unsubscribe(&[Topic::Progress, Topic::Log]);

        assert_eq!(after.len(), 1);
        assert!(!conn.is_subscribed(Topic::Progress));
        assert!(conn.is_subscribed(Topic::Status));
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_resets_idle() {
        let conn = connection(TopicSet::new());
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(conn.idle_for(Instant::now()), Duration::from_secs(10));

        conn.touch();
        assert_eq!(conn.idle_for(Instant::now()), Duration::ZERO);
    }
}
