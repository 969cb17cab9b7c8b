//! # Correlation Benchmarks
//!
//! | Area | Operation |
//! |------|-----------|
//! | Pending table | register then resolve, at several table depths |
//! | Token minting | UUID v7 vs sequence |
//! | Harness | full concurrent batch against a null transport |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use latency_bus::HarnessEvent;
use latency_harness::domain::{PendingEntry, PendingTable, ProbeOrigin};
use latency_harness::{
    EventSink, HarnessApi, HarnessConfig, LatencyHarness, ManualClock, ProbeTransport,
    SequenceTokenMinter, TokenMinter, TransportError, UuidTokenMinter,
};
use latency_types::{BatchMode, CorrelationToken, ProbeEcho, ProbeRequest, TransportKind};
use parking_lot::Mutex;
use std::sync::Arc;

fn entry(token: CorrelationToken) -> PendingEntry {
    PendingEntry {
        token,
        transport: TransportKind::ChannelBased,
        sent_at: 0.0,
        sequence_index: None,
        origin: ProbeOrigin::Batch,
        message: String::new(),
        acknowledged_at: None,
    }
}

fn bench_pending_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("pending-table");

    for depth in [0usize, 100, 10_000] {
        let mut table = PendingTable::new();
        for n in 0..depth {
            table
                .register(entry(CorrelationToken::new(format!("ipc-bg-{n}"))))
                .unwrap();
        }
        let token = CorrelationToken::new("ipc-probe");

        group.bench_with_input(
            BenchmarkId::new("register_resolve", depth),
            &depth,
            |b, _| {
                b.iter(|| {
                    table.register(entry(token.clone())).unwrap();
                    black_box(table.resolve(TransportKind::ChannelBased, &token))
                })
            },
        );
    }

    group.finish();
}

fn bench_token_minting(c: &mut Criterion) {
    let mut group = c.benchmark_group("token-minting");
    let uuid = UuidTokenMinter::new();
    let sequence = SequenceTokenMinter::new();

    group.bench_function("uuid_v7", |b| b.iter(|| black_box(uuid.mint("ws"))));
    group.bench_function("sequence", |b| b.iter(|| black_box(sequence.mint("ws"))));
    group.finish();
}

/// Keeps requests so the bench can answer them.
#[derive(Default)]
struct NullTransport {
    sent: Mutex<Vec<ProbeRequest>>,
}

impl ProbeTransport for NullTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::ChannelBased
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn dispatch(&self, request: &ProbeRequest) -> Result<(), TransportError> {
        self.sent.lock().push(request.clone());
        Ok(())
    }
}

struct DiscardSink;

impl EventSink for DiscardSink {
    fn emit(&self, event: HarnessEvent) {
        black_box(event);
    }
}

fn bench_concurrent_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("harness");

    for size in [10usize, 100, 1_000] {
        let transport = Arc::new(NullTransport::default());
        let harness = LatencyHarness::new(HarnessConfig::default(), Arc::new(DiscardSink))
            .with_clock(Arc::new(ManualClock::new(0.0)));
        harness.attach_transport(transport.clone());

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("concurrent_batch", size), &size, |b, &n| {
            b.iter(|| {
                harness
                    .start_batch(TransportKind::ChannelBased, n, BatchMode::Concurrent)
                    .unwrap();
                let sent = std::mem::take(&mut *transport.sent.lock());
                for request in sent.iter().rev() {
                    let echo = ProbeEcho::reply_to(request, None);
                    harness
                        .on_response(TransportKind::ChannelBased, &echo, 1.0)
                        .unwrap();
                }
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_pending_table,
    bench_token_minting,
    bench_concurrent_batch
);
criterion_main!(benches);
