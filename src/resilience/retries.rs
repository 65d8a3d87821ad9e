//! Retry classification and eligibility.
//!
//! # Responsibilities
//! - Classify failed outcomes into retry-candidate reasons
//! - Gate retry-candidates on idempotency and the attempt budget
//!
//! # Design Decisions
//! - 429 and 503 are always retry-candidates; so is every 5xx except 501
//! - Timeout-class transport failures bypass the idempotency gate since no
//!   partial side effect is assumed to have occurred
//! - An idempotency-key header marks an otherwise unsafe method retryable

use http::{HeaderMap, Method, StatusCode};

use crate::transport::{TransportFailure, TransportFailureKind};

/// Why a failed attempt qualifies for a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    RateLimited,
    Unavailable,
    ServerError,
    Timeout,
    Transport,
}

impl RetryReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RetryReason::RateLimited => "rate_limited",
            RetryReason::Unavailable => "unavailable",
            RetryReason::ServerError => "server_error",
            RetryReason::Timeout => "timeout",
            RetryReason::Transport => "transport",
        }
    }

    /// Timeouts may be retried even for non-idempotent calls.
    pub const fn bypasses_idempotency_gate(&self) -> bool {
        matches!(self, RetryReason::Timeout)
    }
}

/// Classify a response status. `None` means the status is terminal.
pub fn retry_reason_for_status(status: StatusCode) -> Option<RetryReason> {
    match status.as_u16() {
        429 => Some(RetryReason::RateLimited),
        503 => Some(RetryReason::Unavailable),
        500 => Some(RetryReason::ServerError),
        s if s > 500 && s < 600 && s != 501 => Some(RetryReason::ServerError),
        _ => None,
    }
}

/// Classify a transport failure. `None` means the failure is terminal.
pub fn retry_reason_for_failure(failure: &TransportFailure) -> Option<RetryReason> {
    match failure.kind {
        TransportFailureKind::Timeout => Some(RetryReason::Timeout),
        TransportFailureKind::Connect | TransportFailureKind::Transport => {
            Some(RetryReason::Transport)
        }
        TransportFailureKind::Other => None,
    }
}

/// Whether a call may be retried without duplicating side effects.
///
/// An explicit per-call override wins; otherwise safe methods and calls
/// carrying an idempotency-key header qualify.
pub fn is_idempotent(method: &Method, headers: &HeaderMap, explicit: Option<bool>) -> bool {
    if let Some(flag) = explicit {
        return flag;
    }
    if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
        return true;
    }
    headers
        .keys()
        .any(|name| matches!(name.as_str(), "idempotency-key" | "x-idempotency-key"))
}
