//! Demo scaffolding: flags, logging, viewer URLs and shutdown.

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use session_notifier::{ManagerOptions, NotificationManager, Result, Topic};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Args
// ============================================================================

/// Flags shared by the demos.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Log the crate at `debug` instead of `info`.
    pub debug: bool,
    /// Run straight through without waiting for viewers or Ctrl+C.
    pub no_wait: bool,
    /// Overrides `WEBSOCKET_PORT`.
    pub port: Option<u16>,
}

impl Args {
    /// Parses `--debug`, `--no-wait` and `--port N`.
    pub fn parse() -> Self {
        let mut args = Self::default();
        let mut argv = std::env::args().skip(1);

        while let Some(arg) = argv.next() {
            match arg.as_str() {
                "--debug" => args.debug = true,
                "--no-wait" => args.no_wait = true,
                "--port" => args.port = argv.next().and_then(|port| port.parse().ok()),
                other => eprintln!("Ignoring unknown flag {other}"),
            }
        }

        args
    }

    /// Builds a stopped manager from the environment, applying `--port`.
    pub fn manager(&self) -> Result<NotificationManager> {
        let mut options = ManagerOptions::from_env()?;
        if let Some(port) = self.port {
            options = options.with_port(port);
        }
        NotificationManager::new(options)
    }
}

// ============================================================================
// Functions
// ============================================================================

/// `RUST_LOG` wins when set; otherwise only this crate logs.
pub fn init_logging(debug: bool) {
    let fallback = if debug {
        "session_notifier=debug"
    } else {
        "session_notifier=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// URL a viewer opens to follow `session_id` on a running manager.
pub fn viewer_url(manager: &NotificationManager, session_id: &str, topics: &[Topic]) -> String {
    let topics: Vec<&str> = topics.iter().map(|topic| topic.as_str()).collect();
    format!(
        "ws://127.0.0.1:{}/?sessionId={session_id}&subscribe={}",
        manager.port(),
        topics.join(",")
    )
}

/// Waits for Ctrl+C unless `--no-wait` was given.
pub async fn wait_for_exit(manager: &NotificationManager, no_wait: bool) {
    if no_wait {
        return;
    }

    println!(
        "Press Ctrl+C to stop ({} viewer(s) attached)...",
        manager.stats().total_connections
    );
    tokio::signal::ctrl_c().await.ok();
}
