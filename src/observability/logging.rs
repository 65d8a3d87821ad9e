//! Structured logging helpers.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Redact secret-bearing headers before they reach log lines
//! - Correlate log lines and errors through a 32-hex-digit trace id

use http::HeaderMap;
use std::collections::BTreeMap;
use std::fmt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// Respects `RUST_LOG`; defaults to info-level output for this crate.
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tool_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// A 128-bit trace identifier, formatted as 32 lowercase hex digits.
///
/// All-zero when no trace is active, so failures stay correlatable by
/// shape even without a subscriber installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(u128);

impl TraceId {
    pub const ZERO: TraceId = TraceId(0);

    pub fn generate() -> Self {
        TraceId(uuid::Uuid::new_v4().as_u128())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Copy headers into a sorted map with secret values masked.
///
/// `authorization`, `x-signature`, and any header name ending in `_key`
/// are replaced with `***`.
pub fn sanitize_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut redacted = BTreeMap::new();
    for (name, value) in headers {
        let key = name.as_str().to_owned();
        let masked = key == "authorization" || key == "x-signature" || key.ends_with("_key");
        let rendered = if masked {
            "***".to_owned()
        } else {
            value.to_str().unwrap_or("<binary>").to_owned()
        };
        redacted.insert(key, rendered);
    }
    redacted
}

/// Bucket a status code into its class ("2xx", "5xx", ...).
pub fn status_class(status: u16) -> &'static str {
    match status / 100 {
        1 => "1xx",
        2 => "2xx",
        3 => "3xx",
        4 => "4xx",
        5 => "5xx",
        _ => "unknown",
    }
}
