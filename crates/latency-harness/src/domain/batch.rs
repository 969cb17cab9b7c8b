//! Batch run bookkeeping.
//!
//! A [`BatchRun`] only counts; it never sends. The service asks it what to do
//! next after each send, resolution or abandonment via [`BatchStep`].

use latency_types::{BatchMode, CorrelationToken, Millis, TransportKind};
use serde::Serialize;
use std::collections::HashSet;

/// What the controller should do after a batch counter changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStep {
    /// Probes are still in flight.
    Await,
    /// Sequential mode: nothing in flight and probes remain.
    SendNext,
    /// Every probe settled and nothing is in flight.
    Finished,
}

/// The single active batch.
#[derive(Debug, Clone)]
pub struct BatchRun {
    transport: TransportKind,
    mode: BatchMode,
    target_count: usize,
    issued: usize,
    completed: usize,
    abandoned: usize,
    in_flight: HashSet<CorrelationToken>,
    started_at: Millis,
}

/// Read-only view of a batch's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    pub transport: TransportKind,
    pub mode: BatchMode,
    pub target_count: usize,
    pub issued_count: usize,
    pub completed_count: usize,
    pub abandoned_count: usize,
    pub active_count: usize,
    pub started_at: Millis,
}

impl BatchRun {
    pub fn new(
        transport: TransportKind,
        target_count: usize,
        mode: BatchMode,
        started_at: Millis,
    ) -> Self {
        Self {
            transport,
            mode,
            target_count,
            issued: 0,
            completed: 0,
            abandoned: 0,
            in_flight: HashSet::new(),
            started_at,
        }
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    pub fn active(&self) -> usize {
        self.in_flight.len()
    }

    /// Sequence index the next send will carry.
    pub fn next_sequence_index(&self) -> usize {
        self.issued
    }

    /// Sends to issue right after start.
    pub fn initial_sends(&self) -> usize {
        match self.mode {
            BatchMode::Concurrent => self.target_count,
            BatchMode::Sequential => 1.min(self.target_count),
        }
    }

    /// Count a successfully dispatched probe.
    pub fn record_sent(&mut self, token: CorrelationToken) {
        self.issued += 1;
        self.in_flight.insert(token);
    }

    /// Count a matched response. `None` if the token is not part of this run.
    pub fn record_resolved(&mut self, token: &CorrelationToken) -> Option<BatchStep> {
        if !self.in_flight.remove(token) {
            return None;
        }
        self.completed += 1;
        Some(self.step())
    }

    /// Count a probe given up on. `None` if the token is not part of this run.
    pub fn record_abandoned(&mut self, token: &CorrelationToken) -> Option<BatchStep> {
        if !self.in_flight.remove(token) {
            return None;
        }
        self.abandoned += 1;
        Some(self.step())
    }

    pub fn step(&self) -> BatchStep {
        let settled = self.completed + self.abandoned;
        if settled >= self.target_count && self.in_flight.is_empty() {
            BatchStep::Finished
        } else if self.mode == BatchMode::Sequential
            && self.in_flight.is_empty()
            && self.issued < self.target_count
        {
            BatchStep::SendNext
        } else {
            BatchStep::Await
        }
    }

    pub fn progress(&self) -> BatchProgress {
        BatchProgress {
            transport: self.transport,
            mode: self.mode,
            target_count: self.target_count,
            issued_count: self.issued,
            completed_count: self.completed,
            abandoned_count: self.abandoned,
            active_count: self.in_flight.len(),
            started_at: self.started_at,
        }
    }
}
