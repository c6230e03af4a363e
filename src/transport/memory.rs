//! In-process transport.
//!
//! Records every frame instead of writing to a socket. Useful for embedding
//! the manager behind another WebSocket stack's test doubles, and for
//! exercising fan-out without network I/O.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Utf8Bytes;

use crate::error::{Error, Result};

use super::Transport;

// ============================================================================
// Frame
// ============================================================================

/// A frame recorded by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// JSON text frame.
    Text(String),
    /// Keepalive ping.
    Ping,
    /// Close frame.
    Close,
}

// ============================================================================
// MemoryTransport
// ============================================================================

/// [`Transport`] that keeps frames in memory.
#[derive(Debug)]
pub struct MemoryTransport {
    /// Frames in send order.
    frames: Mutex<Vec<Frame>>,
    /// Open flag.
    open: AtomicBool,
    /// When set, text sends fail as if the socket broke.
    failing: AtomicBool,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Creates an open transport with no frames.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
            failing: AtomicBool::new(false),
        }
    }

    /// Makes subsequent text sends fail (or succeed again).
    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Marks the transport closed without recording a close frame.
    ///
    /// Simulates a peer that vanished.
    pub fn sever(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    /// Returns all recorded frames.
    #[must_use]
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().clone()
    }

    /// Returns recorded text frames parsed as JSON.
    #[must_use]
    pub fn messages(&self) -> Vec<Value> {
        self.frames
            .lock()
            .iter()
            .filter_map(|frame| match frame {
                Frame::Text(text) => serde_json::from_str(text).ok(),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of recorded pings.
    #[must_use]
    pub fn ping_count(&self) -> usize {
        self.frames
            .lock()
            .iter()
            .filter(|frame| **frame == Frame::Ping)
            .count()
    }

    /// Returns `true` if a close frame was recorded.
    #[must_use]
    pub fn was_closed(&self) -> bool {
        self.frames.lock().contains(&Frame::Close)
    }

    /// Removes and returns all recorded frames.
    pub fn take_frames(&self) -> Vec<Frame> {
        std::mem::take(&mut *self.frames.lock())
    }
}

impl Transport for MemoryTransport {
    fn send(&self, text: Utf8Bytes) -> Result<()> {
        if !self.is_open() || self.failing.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }

        self.frames.lock().push(Frame::Text(text.as_str().to_owned()));
        Ok(())
    }

    fn ping(&self) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }

        self.frames.lock().push(Frame::Ping);
        Ok(())
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.frames.lock().push(Frame::Close);
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Tests
// ============================================================================
