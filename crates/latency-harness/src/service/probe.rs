//! Transport probe: one timed request and its correlation.

use latency_types::{Millis, ProbeEcho, ProbeRequest, ReverseReply, TransportKind};
use std::sync::Arc;

use crate::domain::{
    Clock, PendingEntry, PendingTable, ProbeOrigin, RoundTripSample, TokenMinter,
};
use crate::error::HarnessError;
use crate::ports::ProbeTransport;

/// Result of correlating an echo.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    Matched {
        entry: PendingEntry,
        sample: RoundTripSample,
    },
    Orphan,
}

/// Wraps one transport's sending half with mint-register-dispatch.
#[derive(Clone)]
pub struct TransportProbe {
    transport: Arc<dyn ProbeTransport>,
}

impl TransportProbe {
    pub fn new(transport: Arc<dyn ProbeTransport>) -> Self {
        Self { transport }
    }

    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn is_ready(&self) -> bool {
        self.transport.is_ready()
    }

    /// Mint, timestamp, register, then dispatch.
    ///
    /// The entry is registered before the request leaves, so its echo can
    /// never arrive first. Nothing stays registered when this returns an
    /// error.
    pub fn send(
        &self,
        table: &mut PendingTable,
        minter: &dyn TokenMinter,
        clock: &dyn Clock,
        sequence_index: Option<usize>,
        origin: ProbeOrigin,
        message: String,
    ) -> Result<PendingEntry, HarnessError> {
        let transport = self.kind();
        if !self.transport.is_ready() {
            return Err(HarnessError::TransportUnavailable { transport });
        }

        let token = minter.mint(transport.token_prefix());
        let sent_at = clock.now_millis();
        let entry = PendingEntry {
            token: token.clone(),
            transport,
            sent_at,
            sequence_index,
            origin,
            message: message.clone(),
            acknowledged_at: None,
        };
        table.register(entry.clone())?;

        let request = ProbeRequest {
            message,
            token,
            send_timestamp: sent_at,
        };
        if let Err(source) = self.transport.dispatch(&request) {
            table.evict(transport, &request.token);
            return Err(HarnessError::Dispatch { transport, source });
        }

        Ok(entry)
    }

    /// Answer a probe the responder started.
    pub fn reply(&self, reply: &ReverseReply) -> Result<(), HarnessError> {
        self.transport
            .reply(reply)
            .map_err(|source| HarnessError::Dispatch {
                transport: self.kind(),
                source,
            })
    }

    /// Resolve an echo against the table.
    pub fn on_response(
        table: &mut PendingTable,
        transport: TransportKind,
        echo: &ProbeEcho,
        received_at: Millis,
    ) -> ResponseOutcome {
        match table.resolve(transport, &echo.token) {
            Some(entry) => {
                let sample = RoundTripSample::between(transport, entry.sent_at, received_at);
                ResponseOutcome::Matched { entry, sample }
            }
            None => ResponseOutcome::Orphan,
        }
    }
}
