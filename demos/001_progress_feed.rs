//! Simulated long-running operation streamed to WebSocket viewers.
//!
//! Demonstrates:
//! - Creating a manager from `WEBSOCKET_PORT` / `WEBSOCKET_ACCESS_TOKEN`
//! - Publishing progress, log and result notifications for one session
//! - Broadcasting a status to every session
//! - Reading server stats
//!
//! Connect a viewer while it runs, e.g.:
//!   websocat 'ws://127.0.0.1:3001/?sessionId=demo&subscribe=progress,log,result'
//!
//! Usage:
//!   cargo run --example 001_progress_feed
//!   cargo run --example 001_progress_feed -- --no-wait
//!   cargo run --example 001_progress_feed -- --debug
//!   cargo run --example 001_progress_feed -- --port 4000

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use common::Args;
use serde_json::json;
use session_notifier::{Broadcast, ProgressStatus, ProgressUpdate, Result, Topic};

// ============================================================================
// Constants
// ============================================================================

const SESSION_ID: &str = "demo";
const STEPS: [&str; 5] = ["fetch", "parse", "validate", "transform", "store"];

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== 001: Progress Feed ===\n");

    // ========================================================================
    // Start Server
    // ========================================================================

    println!("[1] Starting notification server...");

    let manager = args.manager()?;
    manager.start().await?;

    println!("    ✓ Listening on port {}", manager.port());
    println!(
        "    Viewer URL: {}\n",
        common::viewer_url(&manager, SESSION_ID, &[Topic::Progress, Topic::Log, Topic::Result])
    );

    if !args.no_wait {
        println!("    Waiting 5s for viewers to connect...\n");
        tokio::time::sleep(Duration::from_secs(5)).await;
    }

    // ========================================================================
    // Simulated Operation
    // ========================================================================

    println!("[2] Running operation '{SESSION_ID}'...");

    let total = STEPS.len() as u32;
    for (index, step) in STEPS.iter().enumerate() {
        let completed = index as u32;
        let update = ProgressUpdate::new(SESSION_ID)
            .with_operation("import")
            .with_current_step(*step)
            .with_steps(completed, total)
            .with_progress((completed * 100 / total) as u8);

        let reached = manager.send_progress(&update);
        manager.send_log(SESSION_ID, json!({"message": format!("step {step}")}), Some("demo"));

        println!("    [{step}] {reached} viewer(s)");
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    manager.send_progress(
        &ProgressUpdate::new(SESSION_ID)
            .with_operation("import")
            .with_steps(total, total)
            .with_progress(100)
            .with_status(ProgressStatus::Completed),
    );
    manager.send_result(SESSION_ID, json!({"rows": 1200}), Some("demo"));

    println!("    ✓ Operation complete\n");

    // ========================================================================
    // Broadcast & Stats
    // ========================================================================

    println!("[3] Broadcasting maintenance notice...");

    let reached = manager.broadcast_to_all(
        &Broadcast::new(Topic::Status, json!({"notice": "demo finished"})).with_source("demo"),
    );
    println!("    ✓ Reached {reached} connection(s)\n");

    let stats = manager.stats();
    println!("[4] Stats:");
    println!(
        "    sessions={} connections={}",
        stats.session_count, stats.total_connections
    );
    for session in &stats.sessions {
        println!(
            "    - {} ({} connection(s))",
            session.session_id, session.connection_count
        );
    }
    println!();

    common::wait_for_exit(&manager, args.no_wait).await;

    manager.stop().await;
    println!("\n=== Done ===");

    Ok(())
}
