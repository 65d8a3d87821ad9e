//! Exponential backoff with jitter.

use std::time::{Duration, SystemTime};

use crate::config::RetryConfig;

/// Calculate the backoff delay for a failed attempt (1-based).
///
/// `base * 2^(attempt-1)`, scaled by a uniform jitter factor in
/// `[1 - jitter, 1 + jitter]`.
pub fn backoff_delay(retry: &RetryConfig, attempt: u32, rng: &mut fastrand::Rng) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    let exponential_base = 1u64 << exponent;
    let delay_ms = retry.base_delay_ms.saturating_mul(exponential_base);

    let factor = if retry.jitter > 0.0 {
        1.0 - retry.jitter + rng.f64() * 2.0 * retry.jitter
    } else {
        1.0
    };

    Duration::from_secs_f64((delay_ms as f64 / 1000.0 * factor).max(0.0))
}

/// Raise `delay` to at least the server-provided hint, never shorten it.
pub fn apply_retry_after(delay: Duration, retry_after: Option<Duration>) -> Duration {
    match retry_after {
        Some(hint) => delay.max(hint),
        None => delay,
    }
}

/// Parse a `Retry-After` value: a non-negative number of seconds
/// (fractional accepted) or an HTTP-date. Invalid values yield `None`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let raw = value.trim();
    if let Ok(seconds) = raw.parse::<f64>() {
        if seconds.is_finite() && seconds >= 0.0 {
            return Some(Duration::from_secs_f64(seconds));
        }
        return None;
    }
    let when = httpdate::parse_http_date(raw).ok()?;
    Some(
        when.duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO),
    )
}
