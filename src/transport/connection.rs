//! WebSocket-backed transport and its I/O tasks.
//!
//! Each accepted socket is split in two halves:
//!
//! - **Writer task**: owns the sink, drains the connection's
//!   [`OutboundQueue`] in FIFO order, so per-connection ordering is kept.
//! - **Read loop**: driven by the connection handler, turns inbound frames
//!   into [`TransportEvent`]s.
//!
//! Both halves stop as soon as the queue is closed.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

use super::queue::{Enqueued, OutboundQueue, PushError, SlowConsumerPolicy, signalled};
use super::{Transport, TransportEvent};

// ============================================================================
// Constants
// ============================================================================

/// Upper bound on the close handshake once the writer stops.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Types
// ============================================================================

/// Server-side WebSocket stream.
pub(crate) type WsStream = WebSocketStream<TcpStream>;

/// Write half of a [`WsStream`].
pub(crate) type WsSink = SplitSink<WsStream, Message>;

/// Read half of a [`WsStream`].
pub(crate) type WsSource = SplitStream<WsStream>;

// ============================================================================
// WsTransport
// ============================================================================

/// [`Transport`] over a tokio-tungstenite socket.
///
/// Sends are non-blocking pushes into a bounded queue; the writer task does
/// the actual I/O.
pub struct WsTransport {
    /// Remote address.
    peer: SocketAddr,
    /// Frames waiting for the writer task.
    queue: Arc<OutboundQueue<Message>>,
}

impl fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsTransport")
            .field("peer", &self.peer)
            .field("pending", &self.queue.len())
            .field("open", &self.is_open())
            .finish()
    }
}

impl WsTransport {
    /// Wraps the write half and spawns its writer task.
    pub(crate) fn spawn(
        sink: WsSink,
        peer: SocketAddr,
        capacity: usize,
        policy: SlowConsumerPolicy,
    ) -> Self {
        let queue = Arc::new(OutboundQueue::new(capacity, policy));
        tokio::spawn(Self::run_writer(sink, Arc::clone(&queue), peer));

        Self { peer, queue }
    }

    /// Returns the remote address.
    #[inline]
    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Returns a receiver that turns `true` when the transport closes.
    #[must_use]
    pub(crate) fn closed_signal(&self) -> watch::Receiver<bool> {
        self.queue.subscribe_closed()
    }

    /// Writer task: drains the queue into the socket.
    async fn run_writer(mut sink: WsSink, queue: Arc<OutboundQueue<Message>>, peer: SocketAddr) {
        let mut closed = queue.subscribe_closed();

        while let Some(frame) = queue.next().await {
            tokio::select! {
                result = sink.send(frame) => {
                    if let Err(e) = result {
                        debug!(?peer, error = %e, "WebSocket write failed");
                        queue.close();
                        break;
                    }
                }

                () = signalled(&mut closed) => break,
            }
        }

        let _ = timeout(CLOSE_TIMEOUT, sink.close()).await;
        trace!(?peer, "Writer task terminated");
    }
}

impl Transport for WsTransport {
    fn send(&self, text: Utf8Bytes) -> Result<()> {
        match self.queue.push(Message::Text(text)) {
            Ok(Enqueued::Queued) => Ok(()),
            Ok(Enqueued::DroppedOldest) => {
                warn!(peer = ?self.peer, "Outbound queue full, dropped oldest frame");
                Ok(())
            }
            Err(PushError::Closed) => Err(Error::ConnectionClosed),
            Err(PushError::Full) => {
                self.queue.close();
                Err(Error::slow_consumer(self.queue.capacity()))
            }
        }
    }

    fn ping(&self) -> Result<()> {
        self.queue
            .push_control(Message::Ping(Default::default()))
            .map_err(|_| Error::ConnectionClosed)
    }

    fn close(&self) {
        if self.queue.close() {
            debug!(peer = ?self.peer, "Transport closed");
        }
    }

    fn is_open(&self) -> bool {
        !self.queue.is_closed()
    }
}

// ============================================================================
// Read Loop
// ============================================================================

/// Reads inbound frames until the peer leaves, the transport closes or the
/// server shuts down.
///
/// Emits [`TransportEvent::Closed`] or [`TransportEvent::Error`] when the
/// peer side ends; local closes and shutdown end silently.
pub(crate) async fn read_loop<F>(
    mut source: WsSource,
    mut closed: watch::Receiver<bool>,
    mut shutdown: watch::Receiver<bool>,
    mut on_event: F,
) where
    F: FnMut(TransportEvent),
{
    loop {
        tokio::select! {
            message = source.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        on_event(TransportEvent::Text(text.as_str().to_owned()));
                    }

                    Some(Ok(Message::Binary(data))) => {
                        on_event(TransportEvent::Text(String::from_utf8_lossy(&data).into_owned()));
                    }

                    Some(Ok(Message::Pong(_))) => on_event(TransportEvent::Pong),

                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "WebSocket closed by remote");
                        on_event(TransportEvent::Closed);
                        break;
                    }

                    // Pings are answered by tungstenite itself
                    Some(Ok(_)) => {}

                    Some(Err(e)) => {
                        on_event(TransportEvent::Error(e.to_string()));
                        break;
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        on_event(TransportEvent::Closed);
                        break;
                    }
                }
            }

            () = signalled(&mut closed) => break,

            () = signalled(&mut shutdown) => break,
        }
    }

    trace!("Read loop terminated");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpListener;
    use tokio_tungstenite::{MaybeTlsStream, accept_async, connect_async};

    type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn socket_pair() -> (WsStream, SocketAddr, ClientStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let (stream, _) = connect_async(format!("ws://{addr}/")).await.unwrap();
            stream
        });

        let (tcp, peer) = listener.accept().await.unwrap();
        let server = accept_async(tcp).await.unwrap();
        let client = client.await.unwrap();

        (server, peer, client)
    }

    #[tokio::test]
    async fn test_frames_reach_peer_in_order() {
        let (server, peer, mut client) = socket_pair().await;
        let (sink, _source) = server.split();
        let transport = WsTransport::spawn(sink, peer, 8, SlowConsumerPolicy::Disconnect);

        transport.send("first".into()).unwrap();
        transport.send("second".into()).unwrap();

        for expected in ["first", "second"] {
            match client.next().await {
                Some(Ok(Message::Text(text))) => assert_eq!(text.as_str(), expected),
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_close_reaches_peer() {
        let (server, peer, mut client) = socket_pair().await;
        let (sink, _source) = server.split();
        let transport = WsTransport::spawn(sink, peer, 8, SlowConsumerPolicy::Disconnect);

        transport.close();
        assert!(!transport.is_open());
        assert!(matches!(transport.send("late".into()), Err(Error::ConnectionClosed)));

        match client.next().await {
            Some(Ok(Message::Close(_))) | None => {}
            other => panic!("expected close, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_loop_reports_text_and_close() {
        let (server, peer, mut client) = socket_pair().await;
        let (sink, source) = server.split();
        let transport = WsTransport::spawn(sink, peer, 8, SlowConsumerPolicy::Disconnect);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        client.send(Message::Text("hello".into())).await.unwrap();
        client.close(None).await.unwrap();

        let mut events = Vec::new();
        read_loop(source, transport.closed_signal(), shutdown_rx, |event| events.push(event)).await;

        assert_eq!(events.first(), Some(&TransportEvent::Text("hello".to_owned())));
        assert_eq!(events.last(), Some(&TransportEvent::Closed));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_full_queue_disconnects_slow_consumer() {
        let (server, peer, mut client) = socket_pair().await;
        let (sink, _source) = server.split();
        let transport = WsTransport::spawn(sink, peer, 1, SlowConsumerPolicy::Disconnect);

        // The writer task cannot run before the next await.
        transport.send("first".into()).unwrap();
        let overflow = transport.send("second".into());

        assert!(matches!(overflow, Err(Error::SlowConsumer { capacity: 1 })));
        assert!(!transport.is_open());
        assert!(matches!(transport.send("third".into()), Err(Error::ConnectionClosed)));

        match client.next().await {
            Some(Ok(Message::Close(_))) | None => {}
            other => panic!("expected close, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_full_queue_drops_oldest() {
        let (server, peer, mut client) = socket_pair().await;
        let (sink, _source) = server.split();
        let transport = WsTransport::spawn(sink, peer, 1, SlowConsumerPolicy::DropOldest);

        transport.send("first".into()).unwrap();
        transport.send("second".into()).unwrap();
        assert!(transport.is_open());

        match client.next().await {
            Some(Ok(Message::Text(text))) => assert_eq!(text.as_str(), "second"),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_slow_consumer_evicted_from_registry() {
        use crate::manager::ConnectionRegistry;
        use crate::manager::connection::Connection;
        use crate::protocol::Topic;

        let (server, peer, _client) = socket_pair().await;
        let (sink, _source) = server.split();
        let transport = Arc::new(WsTransport::spawn(sink, peer, 1, SlowConsumerPolicy::Disconnect));

        let registry = ConnectionRegistry::new();
        registry.insert(Arc::new(Connection::new(
            "s1".into(),
            [Topic::Log].into_iter().collect(),
            transport.clone(),
        )));

        assert_eq!(registry.broadcast("s1", Topic::Log, &"one".into()), 1);
        assert_eq!(registry.broadcast("s1", Topic::Log, &"two".into()), 0);

        assert!(!transport.is_open());
        assert!(!registry.contains_session("s1"));
    }
}
