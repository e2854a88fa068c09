//! Rate-limit arithmetic for the channel gateway.
//!
//! Discord signals throttling with HTTP 429 plus a suggested wait, carried as
//! `retry_after` seconds in the JSON body and sometimes as a `Retry-After`
//! header. The gateway keeps one process-wide delay; the helpers here compute
//! its next value without touching clocks or timers so the policy stays
//! testable in isolation.

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ThrottleBody {
    retry_after: f64,
}

/// Next value of the shared delay after a throttle suggesting `suggested`.
///
/// Plain assignment bounded by `cap`: a later throttle fully replaces an
/// earlier one rather than compounding it, and the delay keeps its last value
/// once the provider stops throttling.
pub fn next_shared_delay(suggested: Duration, cap: Duration) -> Duration {
    suggested.min(cap)
}

/// Parses `retry_after` seconds out of a 429 response body.
pub fn parse_retry_after_body(body: &str) -> Option<Duration> {
    let parsed = serde_json::from_str::<ThrottleBody>(body).ok()?;
    duration_from_seconds(parsed.retry_after)
}

/// Parses a numeric `Retry-After` header (integral or fractional seconds).
pub fn parse_retry_after_header(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim();
    duration_from_seconds(raw.parse::<f64>().ok()?)
}

/// Suggested wait for a throttled call: the body wins over the header, and
/// with neither present the current shared delay is doubled.
pub fn suggested_retry_delay(
    headers: &reqwest::header::HeaderMap,
    body: &str,
    current_delay: Duration,
) -> Duration {
    parse_retry_after_body(body)
        .or_else(|| parse_retry_after_header(headers))
        .unwrap_or_else(|| current_delay.saturating_mul(2))
}

/// Converts suggested seconds into a [`Duration`], rejecting values it
/// cannot represent.
fn duration_from_seconds(seconds: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(seconds).ok()
}
