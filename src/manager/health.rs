//! Health check for supervisors and tool endpoints.

// ============================================================================
// Imports
// ============================================================================

use std::time::Instant;

use serde::Serialize;
use tracing::warn;

use super::core::NotificationManager;
use super::stats::StatsSnapshot;

/// Component name reported in health checks.
pub const COMPONENT: &str = "websocket-manager";

// ============================================================================
// Types
// ============================================================================

/// Overall verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Listening and serving.
    Healthy,
    /// Not listening and could not be started.
    Warning,
}

/// Result of [`NotificationManager::health_check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Always `"websocket-manager"`.
    pub component: &'static str,
    /// Overall verdict.
    pub status: HealthStatus,
    /// Human-readable summary.
    pub message: String,
    /// Present when the server is running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsSnapshot>,
    /// Start failure, when there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Time spent producing the report.
    pub response_time_ms: u64,
}

impl HealthReport {
    /// Returns `true` for [`HealthStatus::Healthy`].
    #[inline]
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

// ============================================================================
// Health Check
// ============================================================================

impl NotificationManager {
    /// Reports whether the server is serving, starting it if it is not.
    pub async fn health_check(&self) -> HealthReport {
        let started_at = Instant::now();

        let (status, message, error) = if self.is_running() {
            (HealthStatus::Healthy, "running".to_owned(), None)
        } else {
            match self.start().await {
                Ok(()) => (HealthStatus::Healthy, "started".to_owned(), None),
                Err(e) => {
                    warn!(error = %e, "Health check could not start notification server");
                    (HealthStatus::Warning, "not running".to_owned(), Some(e.to_string()))
                }
            }
        };

        let stats = (status == HealthStatus::Healthy).then(|| self.stats());

        HealthReport {
            component: COMPONENT,
            status,
            message,
            stats,
            error,
            response_time_ms: started_at.elapsed().as_millis() as u64,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
