//! Connection handling and inbound message routing.
//!
//! # Connection Flow
//!
//! 1. Accept loop hands a TCP stream to [`NotificationManager::serve_socket`]
//! 2. Upgrade parses `sessionId`, `subscribe` and `token` from the query
//! 3. [`NotificationManager::attach`] unicasts the `connected` status,
//!    regardless of subscriptions, then registers the connection
//! 4. The read loop feeds [`TransportEvent`]s to
//!    [`NotificationManager::handle_transport_event`] until the socket ends
//!
//! Other WebSocket stacks can skip steps 1 and 2 and drive `attach` and
//! `handle_transport_event` with their own [`Transport`].

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::protocol::{ClientMessage, Handshake, MANAGER_SOURCE, NotificationMessage, Topic};
use crate::transport::connection::read_loop;
use crate::transport::server::upgrade;
use crate::transport::{Transport, TransportEvent, WsTransport};

use super::connection::Connection;
use super::core::NotificationManager;

// ============================================================================
// Connection Handler
// ============================================================================

impl NotificationManager {
    /// Registers a transport under the handshake's session.
    ///
    /// The new connection first receives a `status` message with
    /// `{status: "connected", subscriptions, serverTime}`, even when it is
    /// subscribed to nothing. It joins the registry only after that, so no
    /// notification can overtake the greeting. If the greeting cannot be
    /// queued the connection is closed and never registered.
    pub fn attach(&self, handshake: Handshake, transport: Arc<dyn Transport>) -> Arc<Connection> {
        let Handshake {
            session_id,
            subscriptions,
            ..
        } = handshake;

        let connection = Arc::new(Connection::new(session_id, subscriptions, transport));
        let subscriptions = connection.subscriptions();

        let greeted = self.reply(
            &connection,
            json!({
                "status": "connected",
                "subscriptions": subscriptions,
                "serverTime": Utc::now(),
            }),
        );
        if !greeted {
            return connection;
        }

        self.inner.registry.insert(Arc::clone(&connection));
        info!(
            session_id = %connection.session_id(),
            connection_id = %connection.id(),
            ?subscriptions,
            "Client connected"
        );

        connection
    }

    /// Applies one inbound transport event to a connection.
    pub fn handle_transport_event(&self, connection: &Connection, event: TransportEvent) {
        match event {
            TransportEvent::Text(text) => self.route_message(connection, &text),

            TransportEvent::Pong => connection.touch(),

            TransportEvent::Closed => self.detach(connection),

            TransportEvent::Error(error) => {
                warn!(
                    session_id = %connection.session_id(),
                    connection_id = %connection.id(),
                    error = %error,
                    "WebSocket error"
                );
                self.detach(connection);
            }
        }
    }

    /// Closes a connection and removes it from the registry.
    pub(crate) fn detach(&self, connection: &Connection) {
        connection.close();

        if self
            .inner
            .registry
            .remove(connection.session_id().as_str(), connection.id())
            .is_some()
        {
            info!(
                session_id = %connection.session_id(),
                connection_id = %connection.id(),
                "Client disconnected"
            );
        }
    }

    /// Serves one accepted TCP stream until it disconnects.
    pub(crate) async fn serve_socket(
        self,
        stream: TcpStream,
        peer: SocketAddr,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let options = &self.inner.options;
        let (ws_stream, handshake) = upgrade(stream, options.access_token.as_deref()).await?;

        if !self.is_running() {
            debug!(?peer, "Server stopping, dropping new connection");
            return Ok(());
        }

        let (sink, source) = ws_stream.split();
        let transport = WsTransport::spawn(sink, peer, options.queue_capacity, options.slow_consumer);
        let closed = transport.closed_signal();

        let connection = self.attach(handshake, Arc::new(transport));

        read_loop(source, closed, shutdown, |event| {
            self.handle_transport_event(&connection, event);
        })
        .await;

        self.detach(&connection);
        Ok(())
    }
}

// ============================================================================
// Inbound Message Router
// ============================================================================

impl NotificationManager {
    /// Handles a text frame from the client.
    ///
    /// Invalid frames are logged and ignored; the connection stays open.
    fn route_message(&self, connection: &Connection, text: &str) {
        connection.touch();

        let message = match ClientMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    session_id = %connection.session_id(),
                    connection_id = %connection.id(),
                    error = %e,
                    "Ignoring invalid client message"
                );
                return;
            }
        };

        match message {
            ClientMessage::Subscribe { topics } => {
                let subscriptions = connection.subscribe(&topics);
                debug!(connection_id = %connection.id(), ?subscriptions, "Subscribed");
                self.reply(connection, json!({ "subscriptions": subscriptions }));
            }

            ClientMessage::Unsubscribe { topics } => {
                let subscriptions = connection.unsubscribe(&topics);
                debug!(connection_id = %connection.id(), ?subscriptions, "Unsubscribed");
            }

            ClientMessage::Ping => {
                self.reply(connection, json!({ "type": "pong", "serverTime": Utc::now() }));
            }
        }
    }

    /// Unicasts a `status` message, bypassing subscription filtering.
    ///
    /// Returns `false` if the connection was dropped instead.
    fn reply(&self, connection: &Connection, data: Value) -> bool {
        let message = NotificationMessage::new(Topic::Status, connection.session_id().clone(), data)
            .with_source(MANAGER_SOURCE);

        let payload = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "Failed to serialize reply");
                return true;
            }
        };

        match connection.send(payload.into()) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    session_id = %connection.session_id(),
                    connection_id = %connection.id(),
                    error = %e,
                    "Reply failed, dropping connection"
                );
                self.detach(connection);
                false
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::OnceLock;

    use crate::protocol::TopicSet;
    use crate::transport::{MemoryTransport, Utf8Bytes};

    fn manager() -> NotificationManager {
        NotificationManager::builder().port(0).build().unwrap()
    }

    fn open(
        manager: &NotificationManager,
        handshake: Handshake,
    ) -> (Arc<Connection>, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let connection = manager.attach(handshake, transport.clone());
        (connection, transport)
    }

    #[test]
    fn test_connected_status_ignores_filter() {
        let manager = manager();
        let (_, transport) = open(&manager, Handshake::new("s1").with_subscriptions(TopicSet::new()));

        let messages = transport.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["type"], "status");
        assert_eq!(messages[0]["sessionId"], "s1");
        assert_eq!(messages[0]["source"], MANAGER_SOURCE);
        assert_eq!(messages[0]["data"]["status"], "connected");
        assert_eq!(messages[0]["data"]["subscriptions"], json!([]));
        assert!(messages[0]["data"]["serverTime"].is_string());
    }

    #[test]
    fn test_default_handshake_subscriptions() {
        let manager = manager();
        let (connection, transport) = open(&manager, Handshake::new("s1"));

        assert_eq!(connection.subscriptions(), TopicSet::handshake_default());
        assert_eq!(
            transport.messages()[0]["data"]["subscriptions"],
            json!(["progress", "status"])
        );
    }

    #[test]
    fn test_subscribe_enables_delivery() {
        let manager = manager();
        let (connection, transport) = open(&manager, Handshake::new("s1"));

        assert_eq!(manager.send_result("s1", json!({"n": 1}), None), 0);

        manager.handle_transport_event(
            &connection,
            TransportEvent::Text(r#"{"type":"subscribe","topics":["result"]}"#.to_owned()),
        );
        assert_eq!(manager.send_result("s1", json!({"n": 2}), None), 1);

        let messages = transport.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages[1]["data"]["subscriptions"],
            json!(["progress", "status", "result"])
        );
        assert_eq!(messages[2]["type"], "result");
        assert_eq!(messages[2]["data"]["n"], 2);
    }

    #[test]
    fn test_subscribe_with_unknown_topic_changes_nothing() {
        let manager = manager();
        let (connection, transport) = open(&manager, Handshake::new("s1"));
        transport.take_frames();

        manager.handle_transport_event(
            &connection,
            TransportEvent::Text(r#"{"type":"subscribe","topics":["result","weather"]}"#.to_owned()),
        );

        assert!(transport.frames().is_empty());
        assert_eq!(connection.subscriptions(), TopicSet::handshake_default());
        assert!(transport.is_open());
    }

    #[test]
    fn test_unsubscribe_has_no_ack() {
        let manager = manager();
        let (connection, transport) = open(&manager, Handshake::new("s1"));
        transport.take_frames();

        manager.handle_transport_event(
            &connection,
            TransportEvent::Text(r#"{"type":"unsubscribe","topics":["progress"]}"#.to_owned()),
        );

        assert!(transport.frames().is_empty());
        assert!(!connection.is_subscribed(Topic::Progress));
        assert_eq!(manager.send_progress(&crate::protocol::ProgressUpdate::new("s1")), 0);
    }

    #[test]
    fn test_ping_gets_pong_status() {
        let manager = manager();
        let (connection, transport) = open(&manager, Handshake::new("s1").with_subscriptions(TopicSet::new()));
        transport.take_frames();

        manager.handle_transport_event(&connection, TransportEvent::Text(r#"{"type":"ping"}"#.to_owned()));

        let messages = transport.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["type"], "status");
        assert_eq!(messages[0]["data"]["type"], "pong");
        assert!(messages[0]["data"]["serverTime"].is_string());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_message_keeps_connection() {
        let manager = manager();
        let (connection, transport) = open(&manager, Handshake::new("s1"));
        tokio::time::advance(std::time::Duration::from_secs(60)).await;

        manager.handle_transport_event(&connection, TransportEvent::Text("not json".to_owned()));

        assert!(transport.is_open());
        assert_eq!(connection.idle_for(tokio::time::Instant::now()), std::time::Duration::ZERO);
        assert_eq!(manager.send_status("s1", json!({"ok": true}), None), 1);
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        let manager = manager();
        let (connection, transport) = open(&manager, Handshake::new("s1"));
        transport.take_frames();

        manager.handle_transport_event(&connection, TransportEvent::Text(r#"{"type":"shout"}"#.to_owned()));

        assert!(transport.frames().is_empty());
        assert!(transport.is_open());
        assert_eq!(manager.stats().total_connections, 1);
    }

    #[test]
    fn test_close_event_removes_connection() {
        let manager = manager();
        let (connection, transport) = open(&manager, Handshake::new("s1"));

        manager.handle_transport_event(&connection, TransportEvent::Closed);

        assert!(!transport.is_open());
        assert_eq!(manager.stats().session_count, 0);
    }

    #[test]
    fn test_error_event_removes_connection() {
        let manager = manager();
        let (connection, _) = open(&manager, Handshake::new("s1"));

        manager.handle_transport_event(&connection, TransportEvent::Error("reset".to_owned()));

        assert_eq!(manager.stats().total_connections, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_updates_activity() {
        let manager = manager();
        let (connection, _) = open(&manager, Handshake::new("s1"));
        tokio::time::advance(std::time::Duration::from_secs(90)).await;

        manager.handle_transport_event(&connection, TransportEvent::Pong);

        assert_eq!(connection.idle_for(tokio::time::Instant::now()), std::time::Duration::ZERO);
    }

    #[test]
    fn test_failed_connected_status_detaches() {
        let manager = manager();
        let transport = Arc::new(MemoryTransport::new());
        transport.fail_sends(true);

        manager.attach(Handshake::new("s1"), transport.clone());

        assert!(transport.was_closed());
        assert_eq!(manager.stats().total_connections, 0);
    }

    /// Records how many connections were registered at each send.
    #[derive(Default)]
    struct RegistrationWitness {
        manager: OnceLock<NotificationManager>,
        registered_at_send: parking_lot::Mutex<Vec<usize>>,
    }

    impl Transport for RegistrationWitness {
        fn send(&self, _text: Utf8Bytes) -> Result<()> {
            let registered = self.manager.get().map_or(0, |m| m.stats().total_connections);
            self.registered_at_send.lock().push(registered);
            Ok(())
        }

        fn ping(&self) -> Result<()> {
            Ok(())
        }

        fn close(&self) {}

        fn is_open(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_connected_status_precedes_registration() {
        let manager = manager();
        let transport = Arc::new(RegistrationWitness::default());
        transport.manager.set(manager.clone()).unwrap();

        manager.attach(Handshake::new("s1"), transport.clone());
        assert_eq!(manager.send_status("s1", json!({}), None), 1);

        assert_eq!(*transport.registered_at_send.lock(), vec![0, 1]);
    }

    #[test]
    fn test_connected_status_first_under_concurrent_publish() {
        let manager = manager();
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let publishers: Vec<_> = (0..3)
            .map(|_| {
                let manager = manager.clone();
                let done = Arc::clone(&done);
                std::thread::spawn(move || {
                    while !done.load(std::sync::atomic::Ordering::Relaxed) {
                        manager.send_status("s1", json!({"phase": "busy"}), None);
                    }
                })
            })
            .collect();

        for _ in 0..2000 {
            let (connection, transport) = open(&manager, Handshake::new("s1"));
            assert_eq!(transport.messages()[0]["data"]["status"], "connected");
            manager.handle_transport_event(&connection, TransportEvent::Closed);
        }

        done.store(true, std::sync::atomic::Ordering::Relaxed);
        for publisher in publishers {
            publisher.join().unwrap();
        }
    }
}
