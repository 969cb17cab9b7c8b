//! Leg-by-leg timing for probes started by the responder.

use latency_types::Millis;
use serde::{Deserialize, Serialize};

/// Round trip of a responder-started probe, split at the acknowledgement.
///
/// `total_ms` and `outbound_ms` come from the initiator's clock. The
/// processing time is a duration measured on the answering side, so no two
/// clocks are ever subtracted from each other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegTimings {
    pub total_ms: Millis,
    /// Send to acknowledgement
    pub outbound_ms: Option<Millis>,
    pub processing_ms: Millis,
    /// `total - outbound - processing`, inferred
    pub return_ms: Option<Millis>,
}

impl LegTimings {
    /// Split the round trip from `sent_at` to `received_at`.
    ///
    /// Without an acknowledgement only the total and the processing time are
    /// known. Legs are clamped at zero and never exceed the total.
    pub fn measure(
        sent_at: Millis,
        acknowledged_at: Option<Millis>,
        received_at: Millis,
        processing_ms: Millis,
    ) -> Self {
        let total_ms = (received_at - sent_at).max(0.0);
        let processing_ms = processing_ms.clamp(0.0, total_ms);
        let outbound_ms = acknowledged_at.map(|at| (at - sent_at).clamp(0.0, total_ms));

        Self {
            total_ms,
            outbound_ms,
            processing_ms,
            return_ms: outbound_ms.map(|outbound| (total_ms - outbound - processing_ms).max(0.0)),
        }
    }
}
