//! Client-to-server control messages.
//!
//! | `type` | Body | Effect |
//! |--------|------|--------|
//! | `subscribe` | `topics: [..]` | Union topics into the subscription set |
//! | `unsubscribe` | `topics: [..]` | Remove topics from the subscription set |
//! | `ping` | none | Server answers with a `status` pong |
//!
//! Parsing is strict: unknown fields, unknown topic names and unknown types
//! are all rejected with a protocol error. A `subscribe` naming one unknown
//! topic is rejected as a whole, valid topics included, and the connection's
//! subscriptions stay as they were. This differs from the upgrade query
//! (see [`Handshake`](super::Handshake)), which keeps the known topics of a
//! `subscribe=` list and drops the rest.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

use super::Topic;

// ============================================================================
// ClientMessage
// ============================================================================

/// A validated inbound control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Add topics to the connection's subscriptions.
    Subscribe {
        /// Topics to add.
        topics: Vec<Topic>,
    },
    /// Drop topics from the connection's subscriptions.
    Unsubscribe {
        /// Topics to drop.
        topics: Vec<Topic>,
    },
    /// Application-level liveness check.
    Ping,
}

/// Body shared by `subscribe` and `unsubscribe`.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TopicsBody {
    #[serde(rename = "type")]
    _kind: String,
    topics: Vec<Topic>,
}

/// Body of `ping`.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PingBody {
    #[serde(rename = "type")]
    _kind: String,
}

impl ClientMessage {
    /// Parses and validates a raw text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedMessage`] if the frame is not JSON
    /// - [`Error::UnknownMessageType`] if `type` is not recognized
    /// - [`Error::Protocol`] if `type` is missing or the body has the wrong shape
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| Error::malformed(e.to_string()))?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::protocol("missing string field `type`"))?
            .to_owned();

        match kind.as_str() {
            "subscribe" | "unsubscribe" => {
                let body: TopicsBody = serde_json::from_value(value)
                    .map_err(|e| Error::protocol(format!("invalid {kind} message: {e}")))?;

                if kind == "subscribe" {
                    Ok(Self::Subscribe {
                        topics: body.topics,
                    })
                } else {
                    Ok(Self::Unsubscribe {
                        topics: body.topics,
                    })
                }
            }
            "ping" => {
                let _: PingBody = serde_json::from_value(value)
                    .map_err(|e| Error::protocol(format!("invalid ping message: {e}")))?;
                Ok(Self::Ping)
            }
            _ => Err(Error::unknown_message_type(kind)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
