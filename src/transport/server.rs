//! Listening endpoint and WebSocket upgrade.
//!
//! # Connection Flow
//!
//! 1. [`Listener::bind`] acquires the port (failure surfaces from `start()`)
//! 2. The accept loop takes TCP connections from [`Listener::accept`]
//! 3. [`upgrade`] performs the WebSocket handshake and parses the request
//!    target into a [`Handshake`]
//! 4. The connection handler registers the socket

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::Handshake;

use super::connection::WsStream;

// ============================================================================
// Listener
// ============================================================================

/// A bound TCP listener for WebSocket clients.
pub struct Listener {
    /// TCP listener for incoming connections.
    listener: TcpListener,
    /// Address actually bound.
    addr: SocketAddr,
}

impl Listener {
    /// Binds to the specified address and port.
    ///
    /// Use port 0 to let the OS assign a random available port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bind`] if binding fails.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let requested = SocketAddr::new(ip, port);
        let listener = TcpListener::bind(requested)
            .await
            .map_err(|e| Error::bind(requested, &e))?;
        let addr = listener.local_addr()?;

        debug!(%addr, "WebSocket listener bound");

        Ok(Self { listener, addr })
    }

    /// Returns the port the listener is bound to.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Returns the bound socket address.
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns a WebSocket URL for this listener.
    ///
    /// Format: `ws://{ip}:{port}`
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Accepts the next TCP connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if accept fails.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        Ok(self.listener.accept().await?)
    }
}

// ============================================================================
// Upgrade
// ============================================================================

/// Upgrades a TCP stream to WebSocket and parses its handshake parameters.
///
/// When `access_token` is set, requests without a matching `token` query
/// parameter are refused with HTTP 401 before the upgrade completes.
///
/// # Errors
///
/// - [`Error::Unauthorized`] if the token is missing or wrong
/// - [`Error::Handshake`] if the request target is invalid or the upgrade fails
pub(crate) async fn upgrade(
    stream: TcpStream,
    access_token: Option<&str>,
) -> Result<(WsStream, Handshake)> {
    let mut accepted: Option<Handshake> = None;
    let mut refused: Option<Error> = None;

    let callback = |request: &Request, response: Response| {
        let target = request.uri().to_string();

        let handshake = match Handshake::from_uri(&target) {
            Ok(handshake) => handshake,
            Err(e) => {
                let reason = e.to_string();
                refused = Some(e);
                return Err(reject(StatusCode::BAD_REQUEST, reason));
            }
        };

        if let Some(expected) = access_token
            && handshake.token.as_deref() != Some(expected)
        {
            refused = Some(Error::Unauthorized);
            return Err(reject(StatusCode::UNAUTHORIZED, "invalid access token"));
        }

        accepted = Some(handshake);
        Ok(response)
    };

    let upgraded = accept_hdr_async(stream, callback).await;
    let ws_stream = match upgraded {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            return Err(refused
                .unwrap_or_else(|| Error::handshake(format!("WebSocket upgrade failed: {e}"))));
        }
    };

    let handshake =
        accepted.ok_or_else(|| Error::handshake("upgrade completed without a request"))?;

    Ok((ws_stream, handshake))
}

/// Builds an HTTP error response for a refused upgrade.
fn reject(status: StatusCode, reason: impl Into<String>) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.into()));
    *response.status_mut() = status;
    response
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv4Addr;

    use tokio_tungstenite::connect_async;

    use crate::protocol::Topic;

    #[tokio::test]
    async fn test_bind_random_port() {
        let listener = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind should succeed");

        assert!(listener.port() > 0);
        assert_eq!(listener.ws_url(), format!("ws://127.0.0.1:{}", listener.port()));
        assert_eq!(listener.local_addr().ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn test_bind_port_in_use() {
        let first = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind should succeed");

        let second = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), first.port()).await;
        assert!(matches!(second, Err(Error::Bind { .. })));
    }

    #[tokio::test]
    async fn test_upgrade_parses_query() {
        let listener = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await.unwrap();
        let url = format!("{}/?sessionId=s1&subscribe=log", listener.ws_url());
        let client = tokio::spawn(async move { connect_async(url).await.map(|_| ()) });

        let (stream, _) = listener.accept().await.unwrap();
        let (_ws, handshake) = upgrade(stream, None).await.unwrap();

        assert_eq!(handshake.session_id.as_str(), "s1");
        assert!(handshake.subscriptions.contains(Topic::Log));
        assert_eq!(handshake.subscriptions.len(), 1);
        client.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_upgrade_rejects_bad_token() {
        let listener = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await.unwrap();
        let url = format!("{}/?sessionId=s1&token=wrong", listener.ws_url());
        let client = tokio::spawn(async move { connect_async(url).await.map(|_| ()) });

        let (stream, _) = listener.accept().await.unwrap();
        let result = upgrade(stream, Some("secret")).await;

        assert!(matches!(result, Err(Error::Unauthorized)));
        assert!(client.await.unwrap().is_err());
    }
}
