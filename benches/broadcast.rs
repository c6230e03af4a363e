//! Fan-out benchmark suite.
//!
//! Measures the publish path (registry snapshot, single serialization,
//! per-connection filter and queue push) at different session sizes:
//! - Connections per session: 1, 10, 100, 1000
//! - Half of the connections subscribe to the published topic
//!
//! Run with: cargo bench --bench broadcast
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;
use session_notifier::transport::Utf8Bytes;
use session_notifier::{
    Broadcast, Handshake, NotificationManager, ProgressUpdate, Result, Topic, TopicSet, Transport,
};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const CONNECTION_COUNTS: &[usize] = &[1, 10, 100, 1000];
const SESSION_COUNT: usize = 50;

// ============================================================================
// Counting Transport
// ============================================================================

/// Transport that only counts frames, so memory stays flat across iterations.
#[derive(Default)]
struct CountingTransport {
    frames: AtomicUsize,
}

impl Transport for CountingTransport {
    fn send(&self, _text: Utf8Bytes) -> Result<()> {
        self.frames.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) {}

    fn is_open(&self) -> bool {
        true
    }
}

fn manager_with(sessions: usize, per_session: usize) -> NotificationManager {
    let manager = NotificationManager::builder().port(0).build().unwrap();

    for session in 0..sessions {
        for index in 0..per_session {
            let topics: TopicSet = if index % 2 == 0 {
                Topic::ALL.into_iter().collect()
            } else {
                [Topic::Status].into_iter().collect()
            };

            manager.attach(
                Handshake::new(format!("session-{session}")).with_subscriptions(topics),
                Arc::new(CountingTransport::default()),
            );
        }
    }

    manager
}

// ============================================================================
// Benchmark: Single Session Fan-Out
// ============================================================================

fn bench_session_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_fan_out");

    for &count in CONNECTION_COUNTS {
        let manager = manager_with(1, count);
        let update = ProgressUpdate::new("session-0")
            .with_operation("bench")
            .with_progress(42);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("progress", count), &count, |b, _| {
            b.iter(|| black_box(manager.send_progress(&update)));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Broadcast To All
// ============================================================================

fn bench_broadcast_to_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast_to_all");
    let broadcast = Broadcast::new(Topic::Log, json!({"line": "maintenance in 5 minutes"}));

    for &count in &CONNECTION_COUNTS[..3] {
        let manager = manager_with(SESSION_COUNT, count);

        group.throughput(Throughput::Elements((SESSION_COUNT * count) as u64));
        group.bench_with_input(BenchmarkId::new("log", count), &count, |b, _| {
            b.iter(|| black_box(manager.broadcast_to_all(&broadcast)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_session_fan_out, bench_broadcast_to_all);
criterion_main!(benches);
