//! Connection parameters carried by the WebSocket upgrade request.
//!
//! ```text
//! ws://host:3001/?sessionId=job-42&subscribe=progress,error&token=secret
//! ```
//!
//! | Parameter | Default |
//! |-----------|---------|
//! | `sessionId` | `"default"` |
//! | `subscribe` | `progress,status` |
//! | `token` | none |
//!
//! The `subscribe` list is lenient: unknown names are logged and dropped,
//! the known ones are kept. In-band `subscribe` messages are strict instead
//! (see [`ClientMessage`](super::ClientMessage)).

// ============================================================================
// Imports
// ============================================================================

use tracing::warn;
use url::{ParseError, Url};

use crate::error::{Error, Result};
use crate::identifiers::SessionId;

use super::TopicSet;

// ============================================================================
// Handshake
// ============================================================================

/// Parsed handshake parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Session the connection joins.
    pub session_id: SessionId,
    /// Initial subscriptions.
    pub subscriptions: TopicSet,
    /// Access token presented by the client.
    pub token: Option<String>,
}

impl Handshake {
    /// Creates a handshake for a session with default subscriptions.
    #[must_use]
    pub fn new(session_id: impl Into<SessionId>) -> Self {
        Self {
            session_id: session_id.into(),
            subscriptions: TopicSet::handshake_default(),
            token: None,
        }
    }

    /// Replaces the initial subscriptions.
    #[inline]
    #[must_use]
    pub fn with_subscriptions(mut self, subscriptions: TopicSet) -> Self {
        self.subscriptions = subscriptions;
        self
    }

    /// Sets the presented access token.
    #[inline]
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Parses an absolute URL or an origin-form request target.
    ///
    /// Repeated parameters keep their first value. Topic names that are not
    /// recognized are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handshake`] if the URI cannot be parsed.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let url = match Url::parse(uri) {
            Ok(url) => url,
            Err(ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("ws://localhost{uri}"))
                .map_err(|e| Error::handshake(format!("invalid request target {uri}: {e}")))?,
            Err(e) => return Err(Error::handshake(format!("invalid request URI {uri}: {e}"))),
        };

        let mut session_id = None;
        let mut subscribe = None;
        let mut token = None;

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "sessionId" if session_id.is_none() => session_id = Some(value.into_owned()),
                "subscribe" if subscribe.is_none() => subscribe = Some(value.into_owned()),
                "token" if token.is_none() => token = Some(value.into_owned()),
                _ => {}
            }
        }

        let subscriptions = match subscribe {
            Some(list) => {
                let (set, rejected) = TopicSet::parse_list(&list);
                if !rejected.is_empty() {
                    warn!(?rejected, "Ignoring unknown topics in handshake");
                }
                set
            }
            None => TopicSet::handshake_default(),
        };

        Ok(Self {
            session_id: session_id.map(SessionId::new).unwrap_or_default(),
            subscriptions,
            token,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::Topic;

    #[test]
    fn test_defaults_without_query() {
        let hs = Handshake::from_uri("/").unwrap();
        assert_eq!(hs.session_id.as_str(), "default");
        assert_eq!(hs.subscriptions, TopicSet::handshake_default());
        assert!(hs.token.is_none());
    }

    #[test]
    fn test_session_and_subscribe() {
        let hs = Handshake::from_uri("/?sessionId=s1&subscribe=progress,error").unwrap();
        assert_eq!(hs.session_id.as_str(), "s1");
        assert!(hs.subscriptions.contains(Topic::Progress));
        assert!(hs.subscriptions.contains(Topic::Error));
        assert!(!hs.subscriptions.contains(Topic::Status));
    }

    #[test]
    fn test_empty_subscribe_means_nothing() {
        let hs = Handshake::from_uri("/ws?sessionId=s1&subscribe=").unwrap();
        assert!(hs.subscriptions.is_empty());
    }

    #[test]
    fn test_absolute_url_and_encoding() {
        let hs = Handshake::from_uri("ws://example.com:3001/?sessionId=a%20b&token=t0k").unwrap();
        assert_eq!(hs.session_id.as_str(), "a b");
        assert_eq!(hs.token.as_deref(), Some("t0k"));
    }

    #[test]
    fn test_first_value_wins() {
        let hs = Handshake::from_uri("/?sessionId=one&sessionId=two").unwrap();
        assert_eq!(hs.session_id.as_str(), "one");
    }

    #[test]
    fn test_unknown_topics_dropped() {
        let hs = Handshake::from_uri("/?subscribe=log,weather").unwrap();
        assert_eq!(hs.subscriptions.len(), 1);
        assert!(hs.subscriptions.contains(Topic::Log));
    }
}
