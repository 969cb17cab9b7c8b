//! Echo logic shared by both responders.

use latency_types::{ProbeEcho, ProbeRequest};
use std::time::Duration;
use tokio::time::Instant;

/// Build the echo for `request` after waiting `delay`.
///
/// The measured wait is reported as `processingMs`; a zero delay replies at
/// once and reports nothing.
pub async fn echo_after(request: &ProbeRequest, delay: Duration) -> ProbeEcho {
    if delay.is_zero() {
        return ProbeEcho::reply_to(request, None);
    }

    let started = Instant::now();
    tokio::time::sleep(delay).await;
    ProbeEcho::reply_to(request, Some(started.elapsed().as_secs_f64() * 1000.0))
}
