//! Error types for the notification server.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! Only lifecycle and configuration operations surface errors to callers.
//! Publishing never fails from the caller's point of view; transport
//! failures evict the affected connection instead.
//!
//! ```ignore
//! use session_notifier::{NotificationManager, Result};
//!
//! async fn boot() -> Result<NotificationManager> {
//!     let manager = NotificationManager::builder().port(3001).build()?;
//!     manager.start().await?;
//!     Ok(manager)
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Lifecycle | [`Error::Bind`] |
//! | Handshake | [`Error::Handshake`], [`Error::Unauthorized`] |
//! | Transport | [`Error::ConnectionClosed`], [`Error::SlowConsumer`] |
//! | Protocol | [`Error::MalformedMessage`], [`Error::UnknownMessageType`], [`Error::Protocol`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::net::SocketAddr;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when manager options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Failed to bind the listening endpoint.
    ///
    /// Returned by `start()`; no retry is attempted.
    #[error("Failed to bind {addr}: {message}")]
    Bind {
        /// Address that could not be bound.
        addr: SocketAddr,
        /// Underlying OS error text.
        message: String,
    },

    // ========================================================================
    // Handshake Errors
    // ========================================================================
    /// WebSocket upgrade failed.
    #[error("Handshake failed: {message}")]
    Handshake {
        /// Description of the handshake failure.
        message: String,
    },

    /// Handshake did not carry the configured access token.
    #[error("Unauthorized handshake")]
    Unauthorized,

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Transport is closed and cannot accept frames.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Outbound queue is full and the policy is to disconnect.
    #[error("Slow consumer: outbound queue full ({capacity} frames)")]
    SlowConsumer {
        /// Queue capacity that was exceeded.
        capacity: usize,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Inbound frame is not valid JSON.
    #[error("Malformed message: {message}")]
    MalformedMessage {
        /// Parser error text.
        message: String,
    },

    /// Inbound message carries an unrecognized `type`.
    #[error("Unknown message type: {kind}")]
    UnknownMessageType {
        /// The unrecognized type tag.
        kind: String,
    },

    /// Inbound message has a recognized type but an invalid shape.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a bind error from the failed address and IO error.
    #[inline]
    pub fn bind(addr: SocketAddr, err: &IoError) -> Self {
        Self::Bind {
            addr,
            message: err.to_string(),
        }
    }

    /// Creates a handshake error.
    #[inline]
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake {
            message: message.into(),
        }
    }

    /// Creates a slow consumer error.
    #[inline]
    pub fn slow_consumer(capacity: usize) -> Self {
        Self::SlowConsumer { capacity }
    }

    /// Creates a malformed message error.
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMessage {
            message: message.into(),
        }
    }

    /// Creates an unknown message type error.
    #[inline]
    pub fn unknown_message_type(kind: impl Into<String>) -> Self {
        Self::UnknownMessageType { kind: kind.into() }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` for errors caused by a client's inbound frame.
    ///
    /// These are never fatal to the connection.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedMessage { .. } | Self::UnknownMessageType { .. } | Self::Protocol { .. }
        )
    }

    /// Returns `true` for errors that evict the connection.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed | Self::SlowConsumer { .. } | Self::WebSocket(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
