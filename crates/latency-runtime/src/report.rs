//! Plain-text rendering of statistics and batch outcomes.

use latency_bus::HarnessEvent;
use latency_harness::{LegTimings, PendingStats, TransportStatistics};
use latency_types::{BatchMode, TransportKind};
use std::fmt::Write;

const HEADERS: [&str; 6] = [
    "Transport",
    "Count",
    "Avg (ms)",
    "Min (ms)",
    "Max (ms)",
    "Total (ms)",
];

/// Render the statistics table, one row per transport.
pub fn render_statistics(stats: &[TransportStatistics]) -> String {
    if stats.is_empty() {
        return "No statistics available\n".to_string();
    }

    let rows: Vec<[String; 6]> = stats
        .iter()
        .map(|s| {
            [
                s.transport.to_string(),
                s.count.to_string(),
                format!("{:.3}", s.avg_ms),
                format!("{:.3}", s.min_ms),
                format!("{:.3}", s.max_ms),
                format!("{:.3}", s.total_ms),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &HEADERS.map(String::from), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("-+-"));
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String; 6], widths: &[usize; 6]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (cell, &width))| {
            if i == 0 {
                format!("{cell:<width$}")
            } else {
                format!("{cell:>width$}")
            }
        })
        .collect();
    let _ = writeln!(out, "{}", line.join(" | "));
}

/// Per-leg breakdown of a responder-started round trip.
pub fn render_legs(legs: &LegTimings) -> String {
    fn leg(ms: Option<f64>) -> String {
        ms.map_or_else(|| "n/a".to_string(), |ms| format!("{ms:.3} ms"))
    }

    format!(
        "total {:.3} ms | outbound {} | processing {:.3} ms | return {}",
        legs.total_ms,
        leg(legs.outbound_ms),
        legs.processing_ms,
        leg(legs.return_ms)
    )
}

/// Correlation counters and event volume for the whole run.
pub fn render_activity(pending: &PendingStats, events_published: u64) -> String {
    format!(
        "Probes: {} registered, {} matched, {} orphaned, {} evicted, {} timed out; {} events",
        pending.registered,
        pending.resolved,
        pending.orphaned,
        pending.evicted,
        pending.expired,
        events_published
    )
}

/// How a batch ended, taken from its `BatchFinished` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub transport: TransportKind,
    pub mode: BatchMode,
    pub target_count: usize,
    pub completed_count: usize,
    pub abandoned_count: usize,
    pub aborted: bool,
}

impl BatchOutcome {
    pub fn from_event(event: &HarnessEvent) -> Option<Self> {
        match event {
            HarnessEvent::BatchFinished {
                transport,
                mode,
                target_count,
                completed_count,
                abandoned_count,
                aborted,
                ..
            } => Some(Self {
                transport: *transport,
                mode: *mode,
                target_count: *target_count,
                completed_count: *completed_count,
                abandoned_count: *abandoned_count,
                aborted: *aborted,
            }),
            _ => None,
        }
    }

    /// One-line summary.
    pub fn render(&self) -> String {
        let outcome = if self.aborted { "aborted" } else { "completed" };
        let mut line = format!(
            "{} {} batch {}: {}/{} completed",
            self.transport, self.mode, outcome, self.completed_count, self.target_count
        );
        if self.abandoned_count > 0 {
            let _ = write!(line, ", {} timed out", self.abandoned_count);
        }
        line
    }
}
