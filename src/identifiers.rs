//! Type-safe identifiers for sessions and connections.
//!
//! Newtype wrappers prevent mixing a session key with a connection key.
//!
//! | Type | Backing | Source |
//! |------|---------|--------|
//! | [`SessionId`] | `String` | `sessionId` handshake query parameter |
//! | [`ConnectionId`] | UUID v4 | Assigned per accepted socket |

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Constants
// ============================================================================

/// Session used when a client connects without a `sessionId`.
pub const DEFAULT_SESSION: &str = "default";

// ============================================================================
// SessionId
// ============================================================================

/// Opaque session key that groups connections for fan-out.
///
/// Immutable once a connection is established. Several connections may share
/// one session; that is how viewers are multiplexed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session ID from any string.
    ///
    /// An empty string maps to [`DEFAULT_SESSION`].
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            return Self::default();
        }
        Self(value)
    }

    /// Returns the session ID as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self(DEFAULT_SESSION.to_owned())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// ConnectionId
// ============================================================================

/// Identifier for one physical socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generates a fresh random connection ID.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_session_is_default() {
        assert_eq!(SessionId::new(""), SessionId::default());
        assert_eq!(SessionId::default().as_str(), DEFAULT_SESSION);
    }

    #[test]
    fn test_session_display_and_serde() {
        let id = SessionId::from("job-42");
        assert_eq!(id.to_string(), "job-42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"job-42\"");
    }

    #[test]
    fn test_session_borrow_lookup() {
        let mut map = rustc_hash::FxHashMap::default();
        map.insert(SessionId::from("s1"), 1);
        assert_eq!(map.get("s1"), Some(&1));
    }

    #[test]
    fn test_connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }
}
