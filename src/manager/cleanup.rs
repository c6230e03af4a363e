//! Periodic cleanup of idle connections.
//!
//! Every `cleanup_interval` the sweep closes connections idle for longer
//! than `inactivity_timeout` (or already closed) and pings the rest. A pong
//! counts as activity, so a connection stays registered only while its peer
//! keeps answering.

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, trace};

use crate::transport::queue::signalled;

use super::core::NotificationManager;
use super::registry::SweepReport;

// ============================================================================
// Scheduler
// ============================================================================

/// Runs sweeps until shutdown. The first sweep happens one period after start.
pub(crate) async fn run(manager: NotificationManager, mut shutdown: watch::Receiver<bool>) {
    let period = manager.options().cleanup_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                manager.run_cleanup();
            }

            () = signalled(&mut shutdown) => break,
        }
    }

    trace!("Cleanup task terminated");
}

impl NotificationManager {
    /// Runs one cleanup sweep now.
    pub fn run_cleanup(&self) -> SweepReport {
        let report = self
            .inner
            .registry
            .sweep(Instant::now(), self.inner.options.inactivity_timeout);

        if report.evicted > 0 {
            debug!(evicted = report.evicted, pinged = report.pinged, "Cleanup evicted connections");
        } else {
            trace!(pinged = report.pinged, "Cleanup sweep");
        }

        report
    }
}

// ============================================================================
// Tests
// ============================================================================
