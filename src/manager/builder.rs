//! Builder pattern for manager configuration.
//!
//! Provides a fluent API for configuring and creating
//! [`NotificationManager`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use session_notifier::NotificationManager;
//!
//! # fn example() -> session_notifier::Result<()> {
//! let manager = NotificationManager::builder()
//!     .port(3001)
//!     .inactivity_timeout(Duration::from_secs(120))
//!     .access_token("s3cret")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::IpAddr;
use std::time::Duration;

use crate::error::Result;
use crate::transport::SlowConsumerPolicy;

use super::core::NotificationManager;
use super::options::ManagerOptions;

// ============================================================================
// NotificationManagerBuilder
// ============================================================================

/// Builder for configuring a [`NotificationManager`].
///
/// Use [`NotificationManager::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct NotificationManagerBuilder {
    options: ManagerOptions,
}

// ============================================================================
// NotificationManagerBuilder Implementation
// ============================================================================

impl NotificationManagerBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all options, e.g. with [`ManagerOptions::from_env`].
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ManagerOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the listening interface.
    #[inline]
    #[must_use]
    pub fn bind_ip(mut self, ip: IpAddr) -> Self {
        self.options.bind_ip = ip;
        self
    }

    /// Sets the listening port; 0 lets the OS choose.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.options.port = port;
        self
    }

    /// Sets the cleanup period.
    #[inline]
    #[must_use]
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.options.cleanup_interval = interval;
        self
    }

    /// Sets the idle time after which connections are evicted.
    #[inline]
    #[must_use]
    pub fn inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.options.inactivity_timeout = timeout;
        self
    }

    /// Sets the per-connection outbound queue capacity.
    #[inline]
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.options.queue_capacity = capacity;
        self
    }

    /// Sets what happens when a connection's queue is full.
    #[inline]
    #[must_use]
    pub fn slow_consumer(mut self, policy: SlowConsumerPolicy) -> Self {
        self.options.slow_consumer = policy;
        self
    }

    /// Requires clients to connect with `?token=<token>`.
    #[inline]
    #[must_use]
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.options.access_token = Some(token.into());
        self
    }

    /// Builds a stopped manager with validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if an interval,
    /// timeout or capacity is zero, or the token is empty.
    pub fn build(self) -> Result<NotificationManager> {
        NotificationManager::new(self.options)
    }
}

// ============================================================================
// Tests
// ============================================================================
