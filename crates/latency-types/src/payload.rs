//! # Wire Payloads
//!
//! The JSON shapes exchanged with a responder.
//!
//! ```text
//! issuing side ──{message, token, sendTimestamp}──────────────→ responder
//! issuing side ←─{token, originalMessage, sendTimestamp, processingMs?}──┘
//! ```
//!
//! The responder can also start a probe of its own. The issuing side
//! acknowledges it on arrival and answers once it is handled:
//!
//! ```text
//! responder ──{probeId, message, startTime}──────────→ issuing side
//! responder ←─{type: "received", probeId}──────────────┤
//! responder ←─{type: "response", probeId, responseMs}──┘
//! ```

use serde::{Deserialize, Serialize};

use crate::token::CorrelationToken;
use crate::Millis;

/// Outbound probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeRequest {
    /// Human-readable message, echoed back verbatim.
    pub message: String,
    /// Correlation token registered before dispatch.
    pub token: CorrelationToken,
    /// Send time on the issuing side's clock.
    pub send_timestamp: Millis,
}

/// Inbound echo of a [`ProbeRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeEcho {
    /// Token copied from the request.
    pub token: CorrelationToken,
    /// The request's `message`.
    pub original_message: String,
    /// The request's `sendTimestamp`, untouched.
    ///
    /// Informational only: round trips are computed from the pending entry,
    /// never from a value that crossed the process boundary.
    pub send_timestamp: Millis,
    /// Time the responder spent before replying, on its own clock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_ms: Option<Millis>,
}

impl ProbeEcho {
    /// Build the echo a responder sends for `request`.
    #[must_use]
    pub fn reply_to(request: &ProbeRequest, processing_ms: Option<Millis>) -> Self {
        Self {
            token: request.token.clone(),
            original_message: request.message.clone(),
            send_timestamp: request.send_timestamp,
            processing_ms,
        }
    }
}

/// Probe started by the responder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseProbe {
    pub probe_id: CorrelationToken,
    pub message: String,
    /// Start time on the responder's clock. Never compared across sides.
    pub start_time: Millis,
}

/// What the issuing side sends back for a [`ReverseProbe`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReverseReply {
    /// Sent the moment the probe arrives.
    Received {
        #[serde(rename = "probeId")]
        probe_id: CorrelationToken,
    },
    /// Sent once the probe has been handled.
    Response {
        #[serde(rename = "probeId")]
        probe_id: CorrelationToken,
        /// Handling time on the answering side's clock.
        #[serde(rename = "responseMs")]
        response_ms: Millis,
    },
}

impl ReverseReply {
    #[must_use]
    pub fn probe_id(&self) -> &CorrelationToken {
        match self {
            Self::Received { probe_id } | Self::Response { probe_id, .. } => probe_id,
        }
    }
}

/// Any frame the issuing side can receive from a responder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InboundFrame {
    Echo(ProbeEcho),
    Reverse(ReverseProbe),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let request = ProbeRequest {
            message: "Test message #1".into(),
            token: CorrelationToken::from("ws-abc"),
            send_timestamp: 12.5,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["message"], "Test message #1");
        assert_eq!(value["token"], "ws-abc");
        assert_eq!(value["sendTimestamp"], 12.5);
    }

    #[test]
    fn test_echo_omits_missing_processing_time() {
        let request = ProbeRequest {
            message: "hi".into(),
            token: CorrelationToken::from("ipc-1"),
            send_timestamp: 1.0,
        };
        let echo = ProbeEcho::reply_to(&request, None);
        let value = serde_json::to_value(&echo).unwrap();
        assert_eq!(value["originalMessage"], "hi");
        assert!(value.get("processingMs").is_none());
    }

    #[test]
    fn test_echo_accepts_minimal_json() {
        let echo: ProbeEcho = serde_json::from_str(
            r#"{"token":"ws-1","originalMessage":"m","sendTimestamp":3.0}"#,
        )
        .unwrap();
        assert_eq!(echo.token.as_str(), "ws-1");
        assert_eq!(echo.processing_ms, None);
    }

    #[test]
    fn test_reply_wire_shape() {
        let reply = ReverseReply::Response {
            probe_id: CorrelationToken::from("rev-1"),
            response_ms: 5.5,
        };
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["type"], "response");
        assert_eq!(value["probeId"], "rev-1");
        assert_eq!(value["responseMs"], 5.5);

        let received: ReverseReply =
            serde_json::from_str(r#"{"type":"received","probeId":"rev-2"}"#).unwrap();
        assert_eq!(received.probe_id().as_str(), "rev-2");
    }

    #[test]
    fn test_inbound_frame_tells_echo_from_reverse_probe() {
        let echo: InboundFrame = serde_json::from_str(
            r#"{"token":"ipc-1","originalMessage":"m","sendTimestamp":1.0}"#,
        )
        .unwrap();
        assert!(matches!(echo, InboundFrame::Echo(_)));

        let reverse: InboundFrame = serde_json::from_str(
            r#"{"probeId":"rev-1","message":"Message from the responder","startTime":4.0}"#,
        )
        .unwrap();
        match reverse {
            InboundFrame::Reverse(probe) => assert_eq!(probe.probe_id.as_str(), "rev-1"),
            other => panic!("unexpected frame: {other:?}"),
        }

        assert!(serde_json::from_str::<InboundFrame>(r#"{"token":"ipc-1"}"#).is_err());
    }
}
