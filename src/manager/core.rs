//! Notification manager: lifecycle and outbound dispatch.
//!
//! The [`NotificationManager`] owns the listening endpoint, the connection
//! registry and the cleanup task. It is a cheap `Clone` handle; pass it to
//! every collaborator that publishes notifications.
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use session_notifier::{NotificationManager, ProgressUpdate};
//!
//! # async fn example() -> session_notifier::Result<()> {
//! let manager = NotificationManager::builder().port(3001).build()?;
//! manager.start().await?;
//!
//! manager.send_progress(&ProgressUpdate::new("job-42").with_progress(50));
//! manager.send_result("job-42", json!({"rows": 12}), Some("importer"));
//!
//! manager.stop().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::error::Result;
use crate::protocol::{Broadcast, DEFAULT_SOURCE, NotificationMessage, ProgressUpdate, Topic};
use crate::transport::queue::signalled;
use crate::transport::{Listener, Utf8Bytes};

use super::builder::NotificationManagerBuilder;
use super::cleanup;
use super::options::ManagerOptions;
use super::registry::ConnectionRegistry;
use super::stats::StatsSnapshot;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the manager.
pub(crate) struct ManagerInner {
    /// Validated configuration.
    pub options: ManagerOptions,

    /// Live connections by session.
    pub registry: ConnectionRegistry,

    /// Whether the endpoint is up.
    pub running: AtomicBool,

    /// Bound port while running, configured port otherwise.
    pub port: AtomicU16,

    /// Background tasks; `Some` while running.
    pub server: AsyncMutex<Option<ServerTasks>>,
}

/// Handles of the tasks started by `start()`.
pub(crate) struct ServerTasks {
    shutdown: watch::Sender<bool>,
    accept: JoinHandle<()>,
    cleanup: JoinHandle<()>,
}

// ============================================================================
// NotificationManager
// ============================================================================

/// Real-time notification server.
///
/// Delivers session-keyed, topic-filtered notifications to WebSocket
/// clients. Publishing methods never block on network I/O and never fail
/// from the caller's point of view; they return how many connections the
/// message was queued for.
#[derive(Clone)]
pub struct NotificationManager {
    /// Shared inner state.
    pub(crate) inner: Arc<ManagerInner>,
}

// ============================================================================
// NotificationManager - Display
// ============================================================================

impl fmt::Debug for NotificationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationManager")
            .field("running", &self.is_running())
            .field("port", &self.port())
            .field("connections", &self.inner.registry.connection_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// NotificationManager - Construction
// ============================================================================

impl NotificationManager {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> NotificationManagerBuilder {
        NotificationManagerBuilder::new()
    }

    /// Creates a stopped manager.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the options are invalid.
    pub fn new(options: ManagerOptions) -> Result<Self> {
        options.validate()?;

        let port = options.port;
        let inner = ManagerInner {
            options,
            registry: ConnectionRegistry::new(),
            running: AtomicBool::new(false),
            port: AtomicU16::new(port),
            server: AsyncMutex::new(None),
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Creates a stopped manager configured from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if a variable is invalid.
    pub fn from_env() -> Result<Self> {
        Self::new(ManagerOptions::from_env()?)
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ManagerOptions {
        &self.inner.options
    }

    /// Returns `true` while the endpoint is listening.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Returns the bound port while running, the configured port otherwise.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.port.load(Ordering::SeqCst)
    }
}

// ============================================================================
// NotificationManager - Lifecycle
// ============================================================================

impl NotificationManager {
    /// Binds the endpoint and starts the accept loop and cleanup task.
    ///
    /// Returns immediately if already running.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bind`](crate::Error::Bind) if the port cannot be
    /// acquired. No retry is attempted.
    pub async fn start(&self) -> Result<()> {
        let mut server = self.inner.server.lock().await;
        if server.is_some() {
            debug!("Notification server already running");
            return Ok(());
        }

        let options = &self.inner.options;
        let listener = Listener::bind(options.bind_ip, options.port)
            .await
            .inspect_err(|e| error!(error = %e, "Failed to start notification server"))?;

        let port = listener.port();
        self.inner.port.store(port, Ordering::SeqCst);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let accept = tokio::spawn(self.clone().accept_loop(listener, shutdown_rx.clone()));
        let cleanup = tokio::spawn(cleanup::run(self.clone(), shutdown_rx));

        *server = Some(ServerTasks {
            shutdown: shutdown_tx,
            accept,
            cleanup,
        });
        self.inner.running.store(true, Ordering::SeqCst);

        info!(port, authenticated = options.access_token.is_some(), "Notification server started");
        Ok(())
    }

    /// Closes every connection and stops the endpoint and cleanup task.
    ///
    /// Resolves once the listener is closed. Does nothing when stopped.
    pub async fn stop(&self) {
        let mut server = self.inner.server.lock().await;
        let Some(tasks) = server.take() else {
            return;
        };

        self.inner.running.store(false, Ordering::SeqCst);
        tasks.shutdown.send_replace(true);

        let connections = self.inner.registry.drain();
        info!(count = connections.len(), "Closing all connections");
        for connection in connections {
            connection.close();
        }

        if let Err(e) = tasks.accept.await {
            warn!(error = %e, "Accept task ended abnormally");
        }
        if let Err(e) = tasks.cleanup.await {
            warn!(error = %e, "Cleanup task ended abnormally");
        }

        info!("Notification server stopped");
    }

    /// Accepts connections until shutdown.
    async fn accept_loop(self, listener: Listener, mut shutdown: watch::Receiver<bool>) {
        let connection_shutdown = shutdown.clone();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            trace!(?peer, "TCP connection accepted");
                            let manager = self.clone();
                            let shutdown = connection_shutdown.clone();

                            tokio::spawn(async move {
                                if let Err(e) = manager.serve_socket(stream, peer, shutdown).await {
                                    warn!(?peer, error = %e, "Connection rejected");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Accept failed");
                        }
                    }
                }

                () = signalled(&mut shutdown) => break,
            }
        }

        debug!(port = listener.port(), "Accept loop terminated");
    }
}

// ============================================================================
// NotificationManager - Outbound Dispatch
// ============================================================================

impl NotificationManager {
    /// Publishes a `progress` notification to `update.session_id`.
    pub fn send_progress(&self, update: &ProgressUpdate) -> usize {
        match update.to_message() {
            Ok(message) => self.publish(&message),
            Err(e) => {
                error!(session_id = %update.session_id, error = %e, "Failed to encode progress");
                0
            }
        }
    }

    /// Publishes a `status` notification.
    pub fn send_status(&self, session_id: &str, status: Value, source: Option<&str>) -> usize {
        self.send_topic(Topic::Status, session_id, status, source)
    }

    /// Publishes a `result` notification.
    pub fn send_result(&self, session_id: &str, result: Value, source: Option<&str>) -> usize {
        self.send_topic(Topic::Result, session_id, result, source)
    }

    /// Publishes an `error` notification.
    pub fn send_error(&self, session_id: &str, error: Value, source: Option<&str>) -> usize {
        self.send_topic(Topic::Error, session_id, error, source)
    }

    /// Publishes a `log` notification.
    pub fn send_log(&self, session_id: &str, log: Value, source: Option<&str>) -> usize {
        self.send_topic(Topic::Log, session_id, log, source)
    }

    /// Publishes a broadcast to every session.
    ///
    /// Subscription filtering still applies per connection. All sessions see
    /// the same timestamp.
    pub fn broadcast_to_all(&self, broadcast: &Broadcast) -> usize {
        let pinned = broadcast
            .clone()
            .with_timestamp(broadcast.timestamp.unwrap_or_else(Utc::now));

        let delivered: usize = self
            .inner
            .registry
            .session_ids()
            .into_iter()
            .map(|session_id| self.publish(&pinned.to_message(session_id)))
            .sum();

        debug!(kind = %broadcast.kind, delivered, "Broadcast to all sessions");
        delivered
    }

    /// Publishes a fully formed message to its session.
    ///
    /// The message is serialized once and the same frame is queued for each
    /// subscribed connection. Returns the number of connections reached.
    pub fn publish(&self, message: &NotificationMessage) -> usize {
        let registry = &self.inner.registry;
        let session_id = message.session_id.as_str();

        if !registry.contains_session(session_id) {
            trace!(session_id, kind = %message.kind, "No connections for session");
            return 0;
        }

        let payload: Utf8Bytes = match message.to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                error!(session_id, error = %e, "Failed to serialize notification");
                return 0;
            }
        };

        let delivered = registry.broadcast(session_id, message.kind, &payload);
        trace!(session_id, kind = %message.kind, delivered, "Notification published");
        delivered
    }

    /// Wraps a payload for one topic and publishes it.
    fn send_topic(&self, kind: Topic, session_id: &str, data: Value, source: Option<&str>) -> usize {
        let message = NotificationMessage::new(kind, session_id.into(), data)
            .with_source(source.unwrap_or(DEFAULT_SOURCE));

        self.publish(&message)
    }
}

// ============================================================================
// NotificationManager - Stats
// ============================================================================

impl NotificationManager {
    /// Returns a point-in-time snapshot of the server.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        let sessions = self.inner.registry.session_stats(Instant::now());

        StatsSnapshot {
            is_running: self.is_running(),
            port: self.port(),
            total_connections: sessions.iter().map(|s| s.connection_count).sum(),
            session_count: sessions.len(),
            sessions,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
