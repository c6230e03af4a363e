//! Server configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use session_notifier::ManagerOptions;
//!
//! let options = ManagerOptions::new()
//!     .with_port(0)
//!     .with_inactivity_timeout(Duration::from_secs(60));
//! ```
//!
//! # Environment
//!
//! | Variable | Field |
//! |----------|-------|
//! | `WEBSOCKET_PORT` | `port` |
//! | `WEBSOCKET_ACCESS_TOKEN` | `access_token` |

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::SlowConsumerPolicy;

// ============================================================================
// Constants
// ============================================================================

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 3001;

/// Environment variable holding the port.
pub const PORT_ENV: &str = "WEBSOCKET_PORT";

/// Environment variable holding the access token.
pub const ACCESS_TOKEN_ENV: &str = "WEBSOCKET_ACCESS_TOKEN";

// ============================================================================
// ManagerOptions
// ============================================================================

/// Notification server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerOptions {
    /// Interface to listen on.
    pub bind_ip: IpAddr,

    /// Port to listen on; 0 lets the OS choose.
    pub port: u16,

    /// Period of the cleanup sweep.
    pub cleanup_interval: Duration,

    /// Idle time after which a connection is evicted.
    pub inactivity_timeout: Duration,

    /// Outbound frames buffered per connection.
    pub queue_capacity: usize,

    /// What happens when a connection's queue is full.
    pub slow_consumer: SlowConsumerPolicy,

    /// Token clients must present as `?token=`; open endpoint when `None`.
    pub access_token: Option<String>,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ManagerOptions {
    /// Creates options with the default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            cleanup_interval: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(5 * 60),
            queue_capacity: 256,
            slow_consumer: SlowConsumerPolicy::Disconnect,
            access_token: None,
        }
    }

    /// Reads overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `WEBSOCKET_PORT` is not a valid port.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup`, which maps a variable name to its
    /// value.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the port value is not a valid port.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut options = Self::new();
        let read = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        if let Some(port) = read(PORT_ENV) {
            options.port = port.parse().map_err(|_| {
                Error::config(format!("{PORT_ENV} must be a port number, got {port:?}"))
            })?;
        }

        options.access_token = read(ACCESS_TOKEN_ENV);

        Ok(options)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ManagerOptions {
    /// Sets the listening interface.
    #[inline]
    #[must_use]
    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Sets the listening port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the cleanup period.
    #[inline]
    #[must_use]
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Sets the inactivity timeout.
    #[inline]
    #[must_use]
    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    /// Sets the per-connection outbound queue capacity.
    #[inline]
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the slow-consumer policy.
    #[inline]
    #[must_use]
    pub fn with_slow_consumer(mut self, policy: SlowConsumerPolicy) -> Self {
        self.slow_consumer = policy;
        self
    }

    /// Requires clients to present `token`.
    #[inline]
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ManagerOptions {
    /// Checks that durations, capacity and token are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.cleanup_interval.is_zero() {
            return Err(Error::config("cleanup_interval must be greater than zero"));
        }

        if self.inactivity_timeout.is_zero() {
            return Err(Error::config("inactivity_timeout must be greater than zero"));
        }

        if self.queue_capacity == 0 {
            return Err(Error::config("queue_capacity must be at least 1"));
        }

        if self.access_token.as_deref().is_some_and(str::is_empty) {
            return Err(Error::config(
                "access_token must not be empty. Omit it to leave the endpoint open.",
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use rustc_hash::FxHashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: FxHashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let options = ManagerOptions::default();
        assert_eq!(options.port, 3001);
        assert_eq!(options.bind_ip, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(options.cleanup_interval, Duration::from_secs(30));
        assert_eq!(options.inactivity_timeout, Duration::from_secs(300));
        assert_eq!(options.slow_consumer, SlowConsumerPolicy::Disconnect);
        assert!(options.access_token.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_reads_port_and_token() {
        let options =
            ManagerOptions::from_lookup(env(&[(PORT_ENV, "4100"), (ACCESS_TOKEN_ENV, "s3cret")]))
                .unwrap();

        assert_eq!(options.port, 4100);
        assert_eq!(options.access_token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_from_lookup_empty_values_are_unset() {
        let options =
            ManagerOptions::from_lookup(env(&[(PORT_ENV, ""), (ACCESS_TOKEN_ENV, " ")])).unwrap();

        assert_eq!(options.port, DEFAULT_PORT);
        assert!(options.access_token.is_none());
    }

    #[test]
    fn test_from_lookup_bad_port() {
        let result = ManagerOptions::from_lookup(env(&[(PORT_ENV, "70000")]));
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let zero_interval = ManagerOptions::new().with_cleanup_interval(Duration::ZERO);
        assert!(zero_interval.validate().is_err());

        let zero_capacity = ManagerOptions::new().with_queue_capacity(0);
        assert!(zero_capacity.validate().is_err());

        let empty_token = ManagerOptions::new().with_access_token("");
        assert!(empty_token.validate().is_err());
    }
}
