//! Server-to-client notification types.
//!
//! # Format
//!
//! ```json
//! {
//!   "type": "progress",
//!   "sessionId": "job-42",
//!   "data": { ... },
//!   "timestamp": "2026-01-01T00:00:00Z",
//!   "source": "system"
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::SessionId;

use super::Topic;

// ============================================================================
// Constants
// ============================================================================

/// Source label used when a publisher does not name one.
pub const DEFAULT_SOURCE: &str = "system";

/// Source label on messages generated by the server itself.
pub const MANAGER_SOURCE: &str = "websocket-manager";

// ============================================================================
// NotificationMessage
// ============================================================================

/// Unit of delivery to subscribed connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    /// Topic; also the filter key against subscriptions.
    #[serde(rename = "type")]
    pub kind: Topic,

    /// Target session.
    pub session_id: SessionId,

    /// Opaque payload.
    pub data: Value,

    /// Creation time, RFC 3339 on the wire.
    pub timestamp: DateTime<Utc>,

    /// Publisher label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl NotificationMessage {
    /// Creates a message stamped with the current time and no source.
    #[must_use]
    pub fn new(kind: Topic, session_id: SessionId, data: Value) -> Self {
        Self {
            kind,
            session_id,
            data,
            timestamp: Utc::now(),
            source: None,
        }
    }

    /// Sets the source label.
    #[inline]
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Overrides the timestamp.
    #[inline]
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Serializes to the JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Broadcast
// ============================================================================

/// A notification without a session, fanned out to every session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    /// Topic of the resulting messages.
    #[serde(rename = "type")]
    pub kind: Topic,

    /// Opaque payload.
    pub data: Value,

    /// Explicit timestamp; "now" when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Publisher label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Broadcast {
    /// Creates a broadcast for a topic.
    #[must_use]
    pub fn new(kind: Topic, data: Value) -> Self {
        Self {
            kind,
            data,
            timestamp: None,
            source: None,
        }
    }

    /// Sets the source label.
    #[inline]
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Pins the timestamp of every resulting message.
    #[inline]
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Addresses the broadcast to one session.
    #[must_use]
    pub fn to_message(&self, session_id: SessionId) -> NotificationMessage {
        NotificationMessage {
            kind: self.kind,
            session_id,
            data: self.data.clone(),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            source: self.source.clone(),
        }
    }
}

// ============================================================================
// ProgressStatus
// ============================================================================

/// Lifecycle state of a long-running operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// Operation accepted, no work done yet.
    Started,
    /// Operation running.
    #[default]
    InProgress,
    /// Operation finished successfully.
    Completed,
    /// Operation finished with an error.
    Failed,
}

// ============================================================================
// ProgressUpdate
// ============================================================================

/// Structured payload of a `progress` notification.
///
/// [`ProgressUpdate::new`] fills the defaults a partial update gets:
/// operation `"unknown"`, 0 %, one total step, status `in_progress`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    /// Session the operation reports to.
    pub session_id: SessionId,

    /// Operation name.
    pub operation: String,

    /// Percentage, 0 to 100.
    pub progress: u8,

    /// Human-readable label of the current step.
    pub current_step: String,

    /// Number of steps in the operation.
    pub total_steps: u32,

    /// Number of steps finished.
    pub completed_steps: u32,

    /// Lifecycle state.
    pub status: ProgressStatus,

    /// Extra operation-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Error text for failed operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressUpdate {
    /// Creates an update with default fields for a session.
    #[must_use]
    pub fn new(session_id: impl Into<SessionId>) -> Self {
        Self {
            session_id: session_id.into(),
            operation: "unknown".to_owned(),
            progress: 0,
            current_step: String::new(),
            total_steps: 1,
            completed_steps: 0,
            status: ProgressStatus::InProgress,
            data: None,
            error: None,
        }
    }

    /// Sets the operation name.
    #[inline]
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    /// Sets the percentage, clamped to 100.
    #[inline]
    #[must_use]
    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = progress.min(100);
        self
    }

    /// Sets the current step label.
    #[inline]
    #[must_use]
    pub fn with_current_step(mut self, step: impl Into<String>) -> Self {
        self.current_step = step.into();
        self
    }

    /// Sets completed and total step counts.
    #[inline]
    #[must_use]
    pub fn with_steps(mut self, completed: u32, total: u32) -> Self {
        self.completed_steps = completed;
        self.total_steps = total;
        self
    }

    /// Sets the lifecycle state.
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: ProgressStatus) -> Self {
        self.status = status;
        self
    }

    /// Attaches an extra payload.
    #[inline]
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attaches error text.
    #[inline]
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Wraps the update into a `progress` notification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if `data` cannot be encoded.
    pub fn to_message(&self) -> Result<NotificationMessage> {
        let data = serde_json::to_value(self)?;
        Ok(
            NotificationMessage::new(Topic::Progress, self.session_id.clone(), data)
                .with_source(DEFAULT_SOURCE),
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_message_wire_shape() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let msg = NotificationMessage::new(Topic::Result, "s1".into(), json!({"ok": true}))
            .with_timestamp(ts)
            .with_source("ocr");

        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "result");
        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["data"]["ok"], true);
        assert_eq!(value["timestamp"], "2026-01-02T03:04:05Z");
        assert_eq!(value["source"], "ocr");
    }

    #[test]
    fn test_message_omits_missing_source() {
        let msg = NotificationMessage::new(Topic::Log, "s1".into(), json!("line"));
        let json = msg.to_json().unwrap();
        assert!(!json.contains("source"));
    }

    #[test]
    fn test_progress_defaults() {
        let update = ProgressUpdate::new("s1");
        assert_eq!(update.operation, "unknown");
        assert_eq!(update.progress, 0);
        assert_eq!(update.total_steps, 1);
        assert_eq!(update.completed_steps, 0);
        assert_eq!(update.status, ProgressStatus::InProgress);
    }

    #[test]
    fn test_progress_clamped() {
        let update = ProgressUpdate::new("s1").with_progress(250);
        assert_eq!(update.progress, 100);
    }

    #[test]
    fn test_progress_to_message() {
        let update = ProgressUpdate::new("s1")
            .with_operation("invoice-ocr")
            .with_progress(50)
            .with_steps(2, 4)
            .with_current_step("extracting")
            .with_status(ProgressStatus::InProgress);

        let msg = update.to_message().unwrap();
        assert_eq!(msg.kind, Topic::Progress);
        assert_eq!(msg.session_id.as_str(), "s1");
        assert_eq!(msg.data["operation"], "invoice-ocr");
        assert_eq!(msg.data["currentStep"], "extracting");
        assert_eq!(msg.data["completedSteps"], 2);
        assert_eq!(msg.data["status"], "in_progress");
        assert!(msg.data.get("error").is_none());
    }

    #[test]
    fn test_broadcast_addresses_session() {
        let ts = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let broadcast = Broadcast::new(Topic::Log, json!("maintenance"))
            .with_timestamp(ts)
            .with_source("ops");

        let msg = broadcast.to_message("s9".into());
        assert_eq!(msg.kind, Topic::Log);
        assert_eq!(msg.session_id.as_str(), "s9");
        assert_eq!(msg.timestamp, ts);
        assert_eq!(msg.source.as_deref(), Some("ops"));
    }
}
