//! # End-to-End Transport Runs
//!
//! Full runtime wiring over the real message channel and a real WebSocket
//! on an ephemeral localhost port.

use std::time::Duration;

use latency_bus::{EventFilter, EventTopic, HarnessEvent, Subscription};
use latency_harness::adapters::SocketResponder;
use latency_harness::{HarnessApi, ResponderConfig};
use latency_runtime::{LatencyRuntime, RuntimeConfig};
use latency_types::{BatchMode, TransportKind};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

fn local_config(transports: Vec<TransportKind>, delay: Duration) -> RuntimeConfig {
    RuntimeConfig {
        ws_addr: "127.0.0.1:0".into(),
        transports,
        responder: ResponderConfig {
            processing_delay: delay,
        },
        ..RuntimeConfig::default()
    }
}

/// Wait for a status event for `transport` with the given readiness.
async fn wait_for_status(events: &mut Subscription, transport: TransportKind, ready: bool) {
    timeout(WAIT, async {
        while let Some(event) = events.recv().await {
            if let HarnessEvent::TransportStatusChanged {
                transport: seen,
                ready: now,
                ..
            } = event
            {
                if seen == transport && now == ready {
                    return;
                }
            }
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_channel_sequential_includes_processing_delay() {
    let runtime = LatencyRuntime::start(local_config(
        vec![TransportKind::ChannelBased],
        Duration::from_millis(10),
    ))
    .await
    .unwrap();

    let outcome = timeout(
        WAIT,
        runtime.run_batch(TransportKind::ChannelBased, 5, BatchMode::Sequential),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(outcome.completed_count, 5);
    assert!(!outcome.aborted);

    let stats = runtime.harness().statistics();
    assert_eq!(stats[0].count, 5);
    assert!(stats[0].min_ms >= 10.0);
    assert!(stats[0].min_ms <= stats[0].avg_ms && stats[0].avg_ms <= stats[0].max_ms);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_socket_concurrent_batch() {
    let runtime = LatencyRuntime::start(local_config(
        vec![TransportKind::SocketBased],
        Duration::ZERO,
    ))
    .await
    .unwrap();
    let mut orphans = runtime
        .bus()
        .subscribe(EventFilter::topics(vec![EventTopic::Orphans]));

    let outcome = timeout(
        WAIT,
        runtime.run_batch(TransportKind::SocketBased, 20, BatchMode::Concurrent),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(outcome.completed_count, 20);
    assert!(orphans.drain().is_empty());
    assert_eq!(runtime.harness().pending_count(None), 0);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_both_transports_report_separately() {
    let runtime = LatencyRuntime::start(local_config(TransportKind::ALL.to_vec(), Duration::ZERO))
        .await
        .unwrap();

    for transport in TransportKind::ALL {
        let outcome = timeout(WAIT, runtime.run_batch(transport, 4, BatchMode::Sequential))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.transport, transport);
        assert_eq!(outcome.completed_count, 4);
    }

    let stats = runtime.harness().statistics();
    let transports: Vec<_> = stats.iter().map(|s| s.transport).collect();
    assert_eq!(transports, TransportKind::ALL.to_vec());
    assert!(stats.iter().all(|s| s.count == 4));

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_abort_mid_batch_orphans_late_echoes() {
    let runtime = LatencyRuntime::start(local_config(
        vec![TransportKind::ChannelBased],
        Duration::from_millis(200),
    ))
    .await
    .unwrap();
    let mut orphans = runtime
        .bus()
        .subscribe(EventFilter::topics(vec![EventTopic::Orphans]));

    let harness = runtime.harness();
    let batch = runtime.run_batch(TransportKind::ChannelBased, 3, BatchMode::Concurrent);
    let abort = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        harness.abort_batch().unwrap();
    };
    let (outcome, ()) = tokio::join!(batch, abort);
    let outcome = outcome.unwrap();
    assert!(outcome.aborted);
    assert_eq!(outcome.completed_count, 0);

    for _ in 0..3 {
        let event = timeout(WAIT, orphans.recv()).await.unwrap().unwrap();
        assert!(matches!(event, HarnessEvent::Orphan { .. }));
    }
    assert!(runtime.harness().statistics().is_empty());

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_responder_probe_during_channel_batch() {
    let runtime = LatencyRuntime::start(local_config(
        vec![TransportKind::ChannelBased],
        Duration::from_millis(5),
    ))
    .await
    .unwrap();

    let batch = runtime.run_batch(TransportKind::ChannelBased, 5, BatchMode::Sequential);
    let reverse = runtime.reverse_probe("Message from the responder", WAIT);
    let (outcome, legs) = timeout(WAIT, async { tokio::join!(batch, reverse) })
        .await
        .unwrap();

    // Neither flow disturbs the other's correlation.
    assert_eq!(outcome.unwrap().completed_count, 5);
    let legs = legs.unwrap();
    let outbound = legs.outbound_ms.unwrap();
    assert!(outbound <= legs.total_ms);
    assert!(legs.processing_ms <= legs.total_ms);
    assert_eq!(runtime.harness().statistics()[0].count, 5);
    assert_eq!(runtime.harness().pending_stats().orphaned, 0);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_socket_server_toggle_reports_status() {
    let mut runtime = LatencyRuntime::start(local_config(
        vec![TransportKind::SocketBased],
        Duration::ZERO,
    ))
    .await
    .unwrap();
    let mut status = runtime
        .bus()
        .subscribe(EventFilter::topics(vec![EventTopic::TransportStatus]));

    // Stopping returns only once the disconnect has been seen.
    assert!(!runtime.toggle_socket_server().await.unwrap());
    assert!(!runtime.harness().is_transport_ready(TransportKind::SocketBased));
    wait_for_status(&mut status, TransportKind::SocketBased, false).await;
    assert!(runtime
        .harness()
        .start_batch(TransportKind::SocketBased, 1, BatchMode::Sequential)
        .is_err());

    assert!(runtime.toggle_socket_server().await.unwrap());
    wait_for_status(&mut status, TransportKind::SocketBased, true).await;
    assert!(runtime.harness().is_transport_ready(TransportKind::SocketBased));

    let outcome = timeout(
        WAIT,
        runtime.run_batch(TransportKind::SocketBased, 3, BatchMode::Concurrent),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(outcome.completed_count, 3);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_external_responder() {
    let server = SocketResponder::new(ResponderConfig::immediate())
        .bind("127.0.0.1:0")
        .await
        .unwrap();

    let config = RuntimeConfig {
        socket_url: Some(server.url()),
        spawn_responders: false,
        transports: vec![TransportKind::SocketBased],
        ..RuntimeConfig::default()
    };
    let runtime = LatencyRuntime::start(config).await.unwrap();
    assert!(runtime.socket_server_url().is_none());

    let elapsed = runtime
        .ping(TransportKind::SocketBased, "hello", WAIT)
        .await
        .unwrap();
    assert!(elapsed >= 0.0);
    assert_eq!(runtime.harness().statistics()[0].count, 1);

    runtime.shutdown().await;
    server.stop().await;
}
