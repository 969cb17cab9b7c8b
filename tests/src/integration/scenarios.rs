//! # Correlation and Batch Scenarios
//!
//! Drives the harness through scripted transports with a manual clock, so
//! every round trip and every arrival order is chosen by the test.

use latency_bus::HarnessEvent;
use latency_harness::{Clock, FramePayload, HarnessApi, HarnessConfig, HarnessError};
use latency_types::{BatchMode, ErrorKind, TransportKind};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use super::support::{echo, error_kinds, finished, orphan_count, ConstantMinter, Fixture};

const CHANNEL: TransportKind = TransportKind::ChannelBased;
const SOCKET: TransportKind = TransportKind::SocketBased;

// =============================================================================
// BATCH COMPLETION
// =============================================================================

#[test]
fn test_sequential_five_at_ten_ms() {
    let mut f = Fixture::new(HarnessConfig::default());
    f.harness.start_batch(CHANNEL, 5, BatchMode::Sequential).unwrap();

    for round in 0..5 {
        let sent = f.channel.take();
        assert_eq!(sent.len(), 1, "round {round}");
        assert_eq!(sent[0].message, format!("Test message #{} via IPC", round + 1));

        f.clock.advance(10.0);
        f.harness
            .on_response(CHANNEL, &echo(&sent[0]), f.clock.now_millis())
            .unwrap();
    }

    let stats = f.harness.statistics();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].count, 5);
    assert_eq!(stats[0].min_ms, 10.0);
    assert_eq!(stats[0].max_ms, 10.0);
    assert_eq!(stats[0].avg_ms, 10.0);

    let events = f.drain();
    assert_eq!(finished(&events), Some((5, 0, false)));
    assert!(f.harness.batch_status().is_none());
}

#[test]
fn test_concurrent_three_out_of_order() {
    let mut f = Fixture::new(HarnessConfig::default());
    f.harness.start_batch(SOCKET, 3, BatchMode::Concurrent).unwrap();

    let sent = f.socket.take();
    assert_eq!(sent.len(), 3);

    // Arrival order 3, 1, 2.
    for (at, index) in [(4.0, 2), (6.0, 0), (9.0, 1)] {
        f.clock.set(at);
        f.harness
            .on_response(SOCKET, &echo(&sent[index]), f.clock.now_millis())
            .unwrap();
    }

    let events = f.drain();
    assert_eq!(orphan_count(&events), 0);
    assert_eq!(finished(&events), Some((3, 0, false)));

    let stats = f.harness.statistics();
    assert_eq!(stats[0].count, 3);
    assert_eq!(stats[0].min_ms, 4.0);
    assert_eq!(stats[0].max_ms, 9.0);
}

#[test]
fn test_concurrent_sends_all_before_any_resolution() {
    let mut f = Fixture::new(HarnessConfig::default());
    f.harness.start_batch(CHANNEL, 8, BatchMode::Concurrent).unwrap();

    let events = f.drain();
    let sent_events = events
        .iter()
        .filter(|event| matches!(event, HarnessEvent::RequestSent { .. }))
        .count();
    assert_eq!(sent_events, 8);
    assert!(!events
        .iter()
        .any(|event| matches!(event, HarnessEvent::ResponseReceived { .. })));
    assert_eq!(f.harness.pending_count(Some(CHANNEL)), 8);

    let progress = f.harness.batch_status().unwrap();
    assert_eq!(progress.issued_count, 8);
    assert_eq!(progress.active_count, 8);
}

// =============================================================================
// CORRELATION RULES
// =============================================================================

#[test]
fn test_duplicate_delivery_is_orphan() {
    let mut f = Fixture::new(HarnessConfig::default());
    f.harness.send_single(SOCKET, "hello").unwrap();
    let sent = f.socket.take();

    f.clock.set(3.0);
    f.harness.on_response(SOCKET, &echo(&sent[0]), 3.0).unwrap();
    let before = f.harness.statistics();

    let err = f
        .harness
        .on_response(SOCKET, &echo(&sent[0]), 7.0)
        .unwrap_err();
    assert!(matches!(err, HarnessError::OrphanResponse { .. }));
    assert_eq!(f.harness.statistics(), before);
    assert_eq!(orphan_count(&f.drain()), 1);
}

#[test]
fn test_echo_on_wrong_transport_is_orphan() {
    let mut f = Fixture::new(HarnessConfig::default());
    f.harness.send_single(CHANNEL, "hello").unwrap();
    let sent = f.channel.take();

    assert!(f.harness.on_response(SOCKET, &echo(&sent[0]), 1.0).is_err());
    assert_eq!(f.harness.pending_count(Some(CHANNEL)), 1);
    assert_eq!(orphan_count(&f.drain()), 1);
}

#[test]
fn test_wire_echo_decoded_from_text_frame() {
    let f = Fixture::new(HarnessConfig::default());
    f.harness.send_single(SOCKET, "hello").unwrap();
    let sent = f.socket.take();
    f.clock.set(12.5);

    let frame = serde_json::json!({
        "token": sent[0].token.as_str(),
        "originalMessage": "hello",
        "sendTimestamp": sent[0].send_timestamp,
    })
    .to_string();

    let sample = f
        .harness
        .on_frame(SOCKET, FramePayload::Encoded(frame))
        .unwrap()
        .sample()
        .unwrap();
    assert_eq!(sample.elapsed_ms, 12.5);
}

// =============================================================================
// REJECTIONS
// =============================================================================

#[test]
fn test_start_while_running_leaves_batch_untouched() {
    let mut f = Fixture::new(HarnessConfig::default());
    f.harness.start_batch(CHANNEL, 2, BatchMode::Sequential).unwrap();
    let before = f.harness.batch_status();

    let err = f
        .harness
        .start_batch(SOCKET, 4, BatchMode::Concurrent)
        .unwrap_err();
    assert!(matches!(
        err,
        HarnessError::BatchAlreadyRunning { running: CHANNEL }
    ));
    assert_eq!(f.harness.batch_status(), before);
    assert!(f.socket.take().is_empty());

    // The original batch still runs to completion.
    for _ in 0..2 {
        let sent = f.channel.take();
        f.clock.advance(1.0);
        f.harness
            .on_response(CHANNEL, &echo(&sent[0]), f.clock.now_millis())
            .unwrap();
    }
    assert_eq!(finished(&f.drain()), Some((2, 0, false)));
}

#[test]
fn test_unavailable_transport_rejected() {
    let mut f = Fixture::new(HarnessConfig::default());
    f.socket.set_ready(false);

    let err = f
        .harness
        .start_batch(SOCKET, 1, BatchMode::Sequential)
        .unwrap_err();
    assert!(matches!(err, HarnessError::TransportUnavailable { .. }));
    assert!(f.harness.batch_status().is_none());

    let errors = f
        .drain()
        .into_iter()
        .filter(|event| matches!(event, HarnessEvent::Error { .. }))
        .count();
    assert_eq!(errors, 1);
}

// =============================================================================
// MID-BATCH SEND FAILURES
// =============================================================================

#[test]
fn test_colliding_token_stalls_concurrent_batch() {
    let mut f = Fixture::with_minter(
        HarnessConfig::default(),
        Arc::new(ConstantMinter("ipc-same")),
    );
    f.harness.start_batch(CHANNEL, 2, BatchMode::Concurrent).unwrap();

    // The second send reuses the first token and never leaves.
    let sent = f.channel.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(f.harness.pending_count(Some(CHANNEL)), 1);
    assert_eq!(error_kinds(&f.drain()), vec![ErrorKind::DuplicateToken]);

    // The first entry survived the collision.
    f.clock.set(3.0);
    f.harness.on_response(CHANNEL, &echo(&sent[0]), 3.0).unwrap();
    assert_eq!(f.harness.statistics()[0].count, 1);

    let progress = f.harness.batch_status().unwrap();
    assert_eq!(progress.issued_count, 1);
    assert_eq!(progress.completed_count, 1);
    assert_eq!(progress.active_count, 0);
    assert!(finished(&f.drain()).is_none());

    let progress = f.harness.abort_batch().unwrap();
    assert_eq!(progress.completed_count, 1);
    assert_eq!(finished(&f.drain()), Some((1, 0, true)));
    assert!(f.harness.batch_status().is_none());
}

#[test]
fn test_transport_lost_between_sequential_sends() {
    let mut f = Fixture::new(HarnessConfig::default());
    f.harness.start_batch(SOCKET, 2, BatchMode::Sequential).unwrap();
    let sent = f.socket.take();
    assert_eq!(sent.len(), 1);

    // The echo is still delivered, but the follow-up send finds no transport.
    f.socket.set_ready(false);
    f.clock.set(4.0);
    f.harness.on_response(SOCKET, &echo(&sent[0]), 4.0).unwrap();

    assert!(f.socket.take().is_empty());
    let events = f.drain();
    assert_eq!(error_kinds(&events), vec![ErrorKind::TransportUnavailable]);
    assert!(finished(&events).is_none());

    assert_eq!(f.harness.statistics()[0].count, 1);
    assert_eq!(f.harness.pending_count(None), 0);
    let progress = f.harness.batch_status().unwrap();
    assert_eq!(progress.issued_count, 1);
    assert_eq!(progress.completed_count, 1);
    assert_eq!(progress.active_count, 0);

    let progress = f.harness.abort_batch().unwrap();
    assert_eq!(progress.completed_count, 1);
    assert_eq!(finished(&f.drain()), Some((1, 0, true)));

    // Once the transport is back a new batch runs normally.
    f.socket.set_ready(true);
    f.harness.start_batch(SOCKET, 1, BatchMode::Sequential).unwrap();
    assert_eq!(f.socket.take().len(), 1);
}

// =============================================================================
// ABORT AND TIMEOUT
// =============================================================================

#[test]
fn test_abort_then_restart() {
    let mut f = Fixture::new(HarnessConfig::default());
    f.harness.start_batch(CHANNEL, 3, BatchMode::Concurrent).unwrap();
    let stale = f.channel.take();

    let progress = f.harness.abort_batch().unwrap();
    assert_eq!(progress.completed_count, 0);
    assert_eq!(progress.active_count, 3);

    f.harness.start_batch(CHANNEL, 1, BatchMode::Sequential).unwrap();
    let fresh = f.channel.take();

    // Echoes from the aborted batch never count toward the new one.
    assert!(f.harness.on_response(CHANNEL, &echo(&stale[0]), 1.0).is_err());
    f.harness.on_response(CHANNEL, &echo(&fresh[0]), 2.0).unwrap();

    let events = f.drain();
    assert_eq!(orphan_count(&events), 1);
    let outcomes: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            HarnessEvent::BatchFinished {
                completed_count,
                aborted,
                ..
            } => Some((*completed_count, *aborted)),
            _ => None,
        })
        .collect();
    assert_eq!(outcomes, vec![(0, true), (1, false)]);
}

#[test]
fn test_timeout_settles_concurrent_batch() {
    let mut f = Fixture::new(HarnessConfig {
        probe_timeout: Some(Duration::from_millis(50)),
        ..HarnessConfig::default()
    });
    f.harness.start_batch(SOCKET, 3, BatchMode::Concurrent).unwrap();
    let sent = f.socket.take();

    f.clock.set(5.0);
    f.harness.on_response(SOCKET, &echo(&sent[1]), 5.0).unwrap();

    f.clock.set(60.0);
    assert_eq!(f.harness.sweep_expired(), 2);
    assert!(f.harness.batch_status().is_none());

    // Too late now.
    assert!(f.harness.on_response(SOCKET, &echo(&sent[0]), 61.0).is_err());

    let events = f.drain();
    assert_eq!(finished(&events), Some((1, 2, false)));
    let timeouts = events
        .iter()
        .filter(|event| {
            matches!(
                event,
                HarnessEvent::Error {
                    kind: latency_types::ErrorKind::ProbeTimedOut,
                    ..
                }
            )
        })
        .count();
    assert_eq!(timeouts, 2);
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn prop_sequential_never_two_pending(delays in prop::collection::vec(0u32..50, 1..20)) {
        let f = Fixture::new(HarnessConfig::default());
        let count = delays.len();
        f.harness.start_batch(CHANNEL, count, BatchMode::Sequential).unwrap();

        for delay in &delays {
            prop_assert!(f.harness.pending_count(Some(CHANNEL)) <= 1);
            let sent = f.channel.take();
            prop_assert_eq!(sent.len(), 1);
            f.clock.advance(f64::from(*delay));
            f.harness
                .on_response(CHANNEL, &echo(&sent[0]), f.clock.now_millis())
                .unwrap();
        }

        prop_assert!(f.harness.batch_status().is_none());
        prop_assert_eq!(f.harness.pending_count(None), 0);
        prop_assert_eq!(f.harness.statistics()[0].count, count as u64);
    }

    #[test]
    fn prop_concurrent_any_arrival_order(
        order in (1usize..16).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
    ) {
        let mut f = Fixture::new(HarnessConfig::default());
        let count = order.len();
        f.harness.start_batch(SOCKET, count, BatchMode::Concurrent).unwrap();
        let sent = f.socket.take();
        prop_assert_eq!(sent.len(), count);

        for index in &order {
            f.clock.advance(1.5);
            f.harness
                .on_response(SOCKET, &echo(&sent[*index]), f.clock.now_millis())
                .unwrap();
        }

        let events = f.drain();
        prop_assert_eq!(orphan_count(&events), 0);
        prop_assert_eq!(finished(&events), Some((count, 0, false)));

        let stats = &f.harness.statistics()[0];
        prop_assert_eq!(stats.count, count as u64);
        prop_assert!(stats.min_ms <= stats.avg_ms && stats.avg_ms <= stats.max_ms);
    }
}
