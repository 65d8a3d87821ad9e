//! Canonical error model for tool clients.
//!
//! Every failure that crosses the client boundary is a [`CanonicalError`]
//! carrying one code from a closed taxonomy. The mapping functions here are
//! total: any transport failure or HTTP response produces exactly one code,
//! falling back to `unknown_error` and `unexpected_status` respectively.

use http::StatusCode;
use thiserror::Error;

use crate::observability::logging::TraceId;
use crate::transport::{TransportFailure, TransportFailureKind};

/// Closed taxonomy of caller-visible error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NetworkTimeout,
    RateLimited,
    Unauthorized,
    Forbidden,
    NotFound,
    UpstreamError,
    UnexpectedStatus,
    CircuitOpen,
    SchemaValidationError,
    UnknownError,
}

impl ErrorCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NetworkTimeout => "network_timeout",
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::NotFound => "not_found",
            ErrorCode::UpstreamError => "upstream_error",
            ErrorCode::UnexpectedStatus => "unexpected_status",
            ErrorCode::CircuitOpen => "circuit_open",
            ErrorCode::SchemaValidationError => "schema_validation_error",
            ErrorCode::UnknownError => "unknown_error",
        }
    }

    /// Fixed remediation hint for the code, where one exists.
    pub const fn default_hint(&self) -> Option<&'static str> {
        match self {
            ErrorCode::NetworkTimeout => Some("increase HTTP_TIMEOUT_MS or fix server"),
            ErrorCode::RateLimited => Some("honor Retry-After header"),
            ErrorCode::Unauthorized => Some("provide valid credentials"),
            ErrorCode::Forbidden => Some("check tool permissions"),
            ErrorCode::NotFound => Some("verify resource exists"),
            ErrorCode::UpstreamError => Some("retry later or contact tool owner"),
            ErrorCode::CircuitOpen => Some("breaker cooling down"),
            ErrorCode::SchemaValidationError => Some("tool payload failed validation"),
            ErrorCode::UnexpectedStatus | ErrorCode::UnknownError => None,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error surfaced to tool adapters.
///
/// Immutable after construction; [`CanonicalError::with_hint`] builds a new
/// value with the same fields and a replacement hint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .detail.as_deref().unwrap_or(.code.as_str()))]
pub struct CanonicalError {
    pub tool: String,
    pub code: ErrorCode,
    /// HTTP status, absent for transport-level failures.
    pub http: Option<u16>,
    /// Single-line human-readable detail, truncated to 512 characters.
    pub detail: Option<String>,
    pub hint: Option<String>,
    pub trace_id: TraceId,
}

impl CanonicalError {
    pub fn new(
        tool: &str,
        code: ErrorCode,
        http: Option<u16>,
        detail: Option<String>,
        trace_id: TraceId,
    ) -> Self {
        Self {
            tool: tool.to_owned(),
            code,
            http,
            detail: clean_detail(detail),
            hint: code.default_hint().map(str::to_owned),
            trace_id,
        }
    }

    /// Build a copy carrying a different remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Serialize the error for logs or API payloads.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "tool": self.tool,
            "code": self.code.as_str(),
            "http": self.http,
            "detail": self.detail,
            "hint": self.hint,
            "trace_id": self.trace_id.to_string(),
        })
    }
}

/// Collapse newlines and trim overly long messages.
fn clean_detail(detail: Option<String>) -> Option<String> {
    let detail = detail?;
    let flattened = detail.replace('\n', " ").trim().to_owned();
    if flattened.chars().count() > 512 {
        let truncated: String = flattened.chars().take(509).collect();
        return Some(format!("{truncated}…"));
    }
    Some(flattened)
}

/// Map a categorized transport failure to a canonical error.
pub fn map_transport_failure(
    tool: &str,
    failure: &TransportFailure,
    trace_id: TraceId,
) -> CanonicalError {
    let code = match failure.kind {
        TransportFailureKind::Timeout
        | TransportFailureKind::Connect
        | TransportFailureKind::Transport => ErrorCode::NetworkTimeout,
        TransportFailureKind::Other => ErrorCode::UnknownError,
    };
    CanonicalError::new(tool, code, None, Some(failure.message.clone()), trace_id)
}

/// Map a non-2xx HTTP response to a canonical error.
pub fn map_http_response(
    tool: &str,
    status: StatusCode,
    body: &[u8],
    trace_id: TraceId,
) -> CanonicalError {
    let code = match status.as_u16() {
        401 => ErrorCode::Unauthorized,
        403 => ErrorCode::Forbidden,
        404 => ErrorCode::NotFound,
        429 => ErrorCode::RateLimited,
        s if (500..600).contains(&s) => ErrorCode::UpstreamError,
        _ => ErrorCode::UnexpectedStatus,
    };
    let detail = detail_from_body(body, status);
    CanonicalError::new(tool, code, Some(status.as_u16()), detail, trace_id)
}

pub fn map_breaker_open(tool: &str, trace_id: TraceId) -> CanonicalError {
    CanonicalError::new(
        tool,
        ErrorCode::CircuitOpen,
        None,
        Some("circuit breaker open".to_owned()),
        trace_id,
    )
}

pub fn map_json_decode_error(tool: &str, trace_id: TraceId) -> CanonicalError {
    CanonicalError::new(
        tool,
        ErrorCode::SchemaValidationError,
        None,
        Some("response payload was not valid JSON".to_owned()),
        trace_id,
    )
}

pub fn map_payload_too_large(tool: &str, trace_id: TraceId) -> CanonicalError {
    CanonicalError::new(
        tool,
        ErrorCode::SchemaValidationError,
        None,
        Some("response body exceeds validation limit".to_owned()),
        trace_id,
    )
}

/// Map a strict decode failure, keeping serde's path and message.
pub fn map_validation_error(
    tool: &str,
    error: &serde_json::Error,
    trace_id: TraceId,
) -> CanonicalError {
    CanonicalError::new(
        tool,
        ErrorCode::SchemaValidationError,
        None,
        Some(error.to_string()),
        trace_id,
    )
}

/// Best-effort detail extraction: JSON `detail`/`message` field, then raw
/// text, then the reason phrase for empty bodies.
fn detail_from_body(body: &[u8], status: StatusCode) -> Option<String> {
    if body.is_empty() {
        return status.canonical_reason().map(str::to_owned);
    }
    let text = String::from_utf8_lossy(body).into_owned();
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_slice::<serde_json::Value>(body) {
        let field = map
            .get("detail")
            .filter(|v| !field_is_empty(v))
            .or_else(|| map.get("message").filter(|v| !field_is_empty(v)));
        return match field {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => Some(text),
        };
    }
    Some(text)
}

fn field_is_empty(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.is_empty(),
        _ => false,
    }
}
