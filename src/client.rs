//! HTTP client core.
//!
//! Orchestrates one logical request per call: breaker admission, transport
//! send with manual redirect handling, outcome classification, retry with
//! backoff, canonical error mapping, and telemetry. Callers construct
//! clients through [`ClientFactory`] so configuration, breaker registry and
//! the shared transport have one explicit owner.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, LOCATION, RETRY_AFTER};
use http::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::Instrument;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{self, CanonicalError, ErrorCode};
use crate::observability::logging::{sanitize_headers, status_class, TraceId};
use crate::observability::metrics;
use crate::resilience::backoff;
use crate::resilience::circuit_breaker::{BreakerRegistry, BreakerState, CircuitBreaker};
use crate::resilience::retries::{self, RetryReason};
use crate::transport::{
    SharedTransport, Transport, TransportFailure, TransportFailureKind, TransportRequest,
    TransportResponse,
};

/// Redirect hops followed per attempt. Not configurable.
const MAX_REDIRECTS: u32 = 3;

/// A received response with its body read to completion.
#[derive(Debug, Clone)]
pub struct ToolResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl From<TransportResponse> for ToolResponse {
    fn from(response: TransportResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
        }
    }
}

/// Why a client could not be constructed for a base URL.
#[derive(Debug, Error)]
pub enum InvalidUrl {
    #[error("invalid URL: {0}")]
    Parse(#[from] url::ParseError),
    #[error("only http and https schemes are permitted")]
    UnsupportedScheme,
    #[error("host {0:?} not in allow-list")]
    HostNotAllowed(String),
}

/// Owns the pieces shared by every client: configuration, the breaker
/// registry, and the lazily-built transport. One factory per process, or
/// per test harness when isolation matters.
#[derive(Debug)]
pub struct ClientFactory {
    config: Arc<ClientConfig>,
    breakers: BreakerRegistry,
    transport: Arc<SharedTransport>,
}

impl ClientFactory {
    pub fn new(config: ClientConfig) -> Self {
        let breakers = BreakerRegistry::new(config.breaker.clone());
        let transport = Arc::new(SharedTransport::new(config.timeouts.clone()));
        Self {
            config: Arc::new(config),
            breakers,
            transport,
        }
    }

    /// Factory configured from environment variables.
    pub fn from_env() -> Self {
        Self::new(ClientConfig::from_env())
    }

    /// Build a client for `tool` using the shared transport.
    pub fn client(&self, tool: &str, base_url: &str) -> Result<HttpClient, InvalidUrl> {
        self.build(tool, base_url, TransportSource::Shared(self.transport.clone()))
    }

    /// Build a client with its own transport, owned exclusively by the
    /// returned instance. Intended for tests.
    pub fn client_with_transport(
        &self,
        tool: &str,
        base_url: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<HttpClient, InvalidUrl> {
        self.build(tool, base_url, TransportSource::Override(transport))
    }

    /// Tear down the shared transport pool.
    pub async fn shutdown(&self) {
        self.transport.shutdown().await;
    }

    fn build(
        &self,
        tool: &str,
        base_url: &str,
        transport: TransportSource,
    ) -> Result<HttpClient, InvalidUrl> {
        let base = Url::parse(base_url)?;
        validate_url(&base, &self.config)?;
        Ok(HttpClient {
            tool: tool.to_owned(),
            base_url: base,
            config: self.config.clone(),
            breaker: self.breakers.breaker_for(tool),
            transport,
            default_headers: Vec::new(),
            jitter: Mutex::new(fastrand::Rng::new()),
        })
    }
}

#[derive(Clone)]
enum TransportSource {
    Shared(Arc<SharedTransport>),
    Override(Arc<dyn Transport>),
}

impl std::fmt::Debug for TransportSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportSource::Shared(_) => f.write_str("TransportSource::Shared"),
            TransportSource::Override(_) => f.write_str("TransportSource::Override"),
        }
    }
}

impl TransportSource {
    async fn resolve(&self) -> Result<Arc<dyn Transport>, TransportFailure> {
        match self {
            TransportSource::Shared(shared) => {
                let transport = shared.get_or_create().await?;
                Ok(transport)
            }
            TransportSource::Override(transport) => Ok(transport.clone()),
        }
    }
}

/// Outbound client bound to one tool identity and base URL.
#[derive(Debug)]
pub struct HttpClient {
    tool: String,
    base_url: Url,
    config: Arc<ClientConfig>,
    breaker: Arc<CircuitBreaker>,
    transport: TransportSource,
    default_headers: Vec<(String, String)>,
    jitter: Mutex<fastrand::Rng>,
}

impl HttpClient {
    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Add a header sent with every request from this client. Call-site
    /// headers with the same name take precedence.
    pub fn with_default_header(mut self, name: &str, value: &str) -> Self {
        self.default_headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Seed the jitter source for deterministic backoff in tests.
    pub fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.jitter = Mutex::new(fastrand::Rng::with_seed(seed));
        self
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder<'_> {
        RequestBuilder {
            client: self,
            method,
            path: path.to_owned(),
            headers: Vec::new(),
            query: Vec::new(),
            json: None,
            body: None,
            timeout: None,
            idempotent: None,
        }
    }

    pub fn get(&self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::PUT, path)
    }

    pub fn delete(&self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::DELETE, path)
    }
}

/// One logical request under construction.
#[derive(Debug)]
pub struct RequestBuilder<'a> {
    client: &'a HttpClient,
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    json: Option<serde_json::Value>,
    body: Option<Bytes>,
    timeout: Option<Duration>,
    idempotent: Option<bool>,
}

impl RequestBuilder<'_> {
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_owned(), value.to_owned()));
        self
    }

    /// Send a JSON body; sets `content-type` unless already present.
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.json = Some(body);
        self
    }

    /// Send a raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Override the per-attempt timeout for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Explicitly mark the call idempotent (or not), overriding the
    /// method- and header-based inference.
    pub fn idempotent(mut self, flag: bool) -> Self {
        self.idempotent = Some(flag);
        self
    }

    /// Run the request loop and return the final response.
    pub async fn send(self) -> Result<ToolResponse, CanonicalError> {
        let (response, _) = self.execute().await?;
        Ok(response)
    }

    /// Run the request and decode the body as JSON.
    ///
    /// Returns `None` for an empty body. Oversized bodies and decode
    /// failures raise distinct `schema_validation_error` details.
    pub async fn send_json(self) -> Result<Option<serde_json::Value>, CanonicalError> {
        let tool = self.client.tool.clone();
        let limit = self.client.config.validation_limit_bytes;
        let (response, trace_id) = self.execute().await?;
        if response.body.len() > limit {
            return Err(error::map_payload_too_large(&tool, trace_id));
        }
        if response.body.is_empty() {
            return Ok(None);
        }
        match serde_json::from_slice(&response.body) {
            Ok(value) => Ok(Some(value)),
            Err(_) => Err(error::map_json_decode_error(&tool, trace_id)),
        }
    }

    /// Run the request and strictly decode the body into `T`.
    ///
    /// Decode failures, including unknown fields on `deny_unknown_fields`
    /// models, surface as `schema_validation_error` with the serde path and
    /// message in the detail.
    pub async fn send_typed<T: DeserializeOwned>(self) -> Result<T, CanonicalError> {
        let tool = self.client.tool.clone();
        let limit = self.client.config.validation_limit_bytes;
        let (response, trace_id) = self.execute().await?;
        if response.body.len() > limit {
            return Err(error::map_payload_too_large(&tool, trace_id));
        }
        if response.body.is_empty() {
            return Err(CanonicalError::new(
                &tool,
                ErrorCode::SchemaValidationError,
                None,
                Some("response body was empty".to_owned()),
                trace_id,
            ));
        }
        serde_json::from_slice(&response.body)
            .map_err(|e| error::map_validation_error(&tool, &e, trace_id))
    }

    async fn execute(self) -> Result<(ToolResponse, TraceId), CanonicalError> {
        let client = self.client;
        let tool = client.tool.clone();

        let mut url = resolve_url(&client.base_url, &self.path, &client.config)
            .map_err(|e| terminal_internal_error(&tool, e.to_string()))?;
        if !self.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(self.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }

        let mut headers = build_headers(&client.default_headers, &self.headers)
            .map_err(|detail| terminal_internal_error(&tool, detail))?;

        let body = match (&self.json, &self.body) {
            (Some(value), _) => {
                headers
                    .entry(CONTENT_TYPE)
                    .or_insert(HeaderValue::from_static("application/json"));
                let encoded = serde_json::to_vec(value)
                    .map_err(|e| terminal_internal_error(&tool, e.to_string()))?;
                Some(Bytes::from(encoded))
            }
            (None, Some(raw)) => Some(raw.clone()),
            (None, None) => None,
        };

        let idempotent_call = retries::is_idempotent(&self.method, &headers, self.idempotent);
        let sanitized = sanitize_headers(&headers);

        let transport = client
            .transport
            .resolve()
            .await
            .map_err(|failure| {
                let error = error::map_transport_failure(&tool, &failure, TraceId::ZERO);
                metrics::record_error(&tool, error.code.as_str());
                error
            })?;

        let method = self.method.clone();
        let timeout = self.timeout;
        let max_retries = client.config.retry.max_retries;

        let span = tracing::info_span!(
            "http_request",
            tool = %tool,
            http.method = %method,
            http.url = %url,
            http.status_code = tracing::field::Empty,
            breaker_state = tracing::field::Empty,
            retry_count = tracing::field::Empty,
            error_code = tracing::field::Empty,
        );
        let trace_id = if span.is_disabled() {
            TraceId::ZERO
        } else {
            TraceId::generate()
        };

        let outcome = async {
            let mut attempt: u32 = 0;
            loop {
                attempt += 1;

                let admission = client.breaker.allow();
                if admission == BreakerState::Open {
                    let error = error::map_breaker_open(&tool, trace_id);
                    metrics::record_error(&tool, error.code.as_str());
                    tracing::warn!(
                        trace_id = %trace_id,
                        tool = %tool,
                        phase = "breaker",
                        method = %method,
                        url = %url,
                        code = error.code.as_str(),
                        "request rejected by open circuit breaker"
                    );
                    tracing::Span::current().record("error_code", error.code.as_str());
                    return Err(error);
                }
                tracing::Span::current().record("breaker_state", admission.as_str());

                let start = Instant::now();
                tracing::debug!(
                    trace_id = %trace_id,
                    tool = %tool,
                    phase = "send",
                    method = %method,
                    url = %url,
                    headers = ?sanitized,
                    attempt,
                    "sending request"
                );

                let result = send_with_redirects(
                    transport.as_ref(),
                    &client.config,
                    &method,
                    &url,
                    &headers,
                    body.clone(),
                    timeout,
                )
                .await;

                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

                match result {
                    Ok(response) => {
                        let class = status_class(response.status.as_u16());
                        metrics::record_latency(&tool, method.as_str(), class, elapsed_ms);
                        tracing::debug!(
                            trace_id = %trace_id,
                            tool = %tool,
                            phase = "recv",
                            method = %method,
                            url = %url,
                            status = response.status.as_u16(),
                            latency_ms = elapsed_ms,
                            attempt,
                            "received response"
                        );
                        let span = tracing::Span::current();
                        span.record("http.status_code", response.status.as_u16());
                        span.record("retry_count", attempt - 1);

                        // A redirect here survived the follow loop (cap
                        // exhausted or no Location); it is handed back to
                        // the caller as the final response.
                        if response.status.is_success() || is_redirect(response.status) {
                            client.breaker.record(true);
                            return Ok(ToolResponse::from(response));
                        }

                        let reason = retries::retry_reason_for_status(response.status);
                        client.breaker.record(false);
                        if let Some(reason) = reason {
                            if attempt <= max_retries && idempotent_call {
                                sleep_with_backoff(
                                    client,
                                    &tool,
                                    attempt,
                                    reason,
                                    Some(&response),
                                    trace_id,
                                )
                                .await;
                                continue;
                            }
                        }

                        let error = error::map_http_response(
                            &tool,
                            response.status,
                            &response.body,
                            trace_id,
                        );
                        metrics::record_error(&tool, error.code.as_str());
                        tracing::Span::current().record("error_code", error.code.as_str());
                        return Err(error);
                    }
                    Err(failure) => {
                        metrics::record_latency(&tool, method.as_str(), "unknown", elapsed_ms);
                        let reason = retries::retry_reason_for_failure(&failure);
                        client.breaker.record(false);
                        if let Some(reason) = reason {
                            if attempt <= max_retries
                                && (idempotent_call || reason.bypasses_idempotency_gate())
                            {
                                sleep_with_backoff(client, &tool, attempt, reason, None, trace_id)
                                    .await;
                                continue;
                            }
                        }

                        let error = error::map_transport_failure(&tool, &failure, trace_id);
                        metrics::record_error(&tool, error.code.as_str());
                        tracing::Span::current().record("error_code", error.code.as_str());
                        return Err(error);
                    }
                }
            }
        }
        .instrument(span)
        .await;

        outcome.map(|response| (response, trace_id))
    }
}

/// Sleep before the next attempt, honoring any Retry-After hint on the
/// failed response. Records the retry counter and a span event first.
async fn sleep_with_backoff(
    client: &HttpClient,
    tool: &str,
    attempt: u32,
    reason: RetryReason,
    response: Option<&TransportResponse>,
    trace_id: TraceId,
) {
    let delay = {
        let mut rng = lock_unpoisoned(&client.jitter);
        backoff::backoff_delay(&client.config.retry, attempt, &mut rng)
    };
    let retry_after = response
        .and_then(|r| r.headers.get(RETRY_AFTER))
        .and_then(|v| v.to_str().ok())
        .and_then(backoff::parse_retry_after);
    let delay = backoff::apply_retry_after(delay, retry_after);

    metrics::record_retry(tool, reason.as_str());
    tracing::info!(
        trace_id = %trace_id,
        tool = %tool,
        phase = "retry",
        reason = reason.as_str(),
        delay_ms = delay.as_millis() as u64,
        attempt,
        "retry"
    );
    tokio::time::sleep(delay).await;
}

/// Send one attempt, following up to [`MAX_REDIRECTS`] redirect hops.
///
/// A 303 downgrades the follow-up to a bodyless GET; other redirect codes
/// preserve method and body. Past the cap the last response is returned
/// as-is. Every redirect target is re-validated against the scheme and
/// host allow-list.
async fn send_with_redirects(
    transport: &dyn Transport,
    config: &ClientConfig,
    method: &Method,
    url: &Url,
    headers: &HeaderMap,
    body: Option<Bytes>,
    timeout: Option<Duration>,
) -> Result<TransportResponse, TransportFailure> {
    let mut request = TransportRequest {
        method: method.clone(),
        url: url.clone(),
        headers: headers.clone(),
        body,
        timeout,
    };
    let mut redirects = 0;
    loop {
        let response = transport.send(&request).await?;
        if is_redirect(response.status) && redirects < MAX_REDIRECTS {
            if let Some(location) = response
                .headers
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
            {
                redirects += 1;
                let next = resolve_url(&request.url, location, config).map_err(|e| {
                    TransportFailure::new(TransportFailureKind::Other, e.to_string())
                })?;
                tracing::debug!(
                    from = %request.url,
                    to = %next,
                    status = response.status.as_u16(),
                    "following redirect"
                );
                request.url = next;
                if response.status == StatusCode::SEE_OTHER {
                    request.method = Method::GET;
                    request.body = None;
                }
                continue;
            }
        }
        return Ok(response);
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

/// Resolve `path` against `base` and validate the result.
fn resolve_url(base: &Url, path: &str, config: &ClientConfig) -> Result<Url, InvalidUrl> {
    let url = match Url::parse(path) {
        Ok(absolute) => absolute,
        Err(url::ParseError::RelativeUrlWithoutBase) => base.join(path)?,
        Err(e) => return Err(e.into()),
    };
    validate_url(&url, config)?;
    Ok(url)
}

fn validate_url(url: &Url, config: &ClientConfig) -> Result<(), InvalidUrl> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(InvalidUrl::UnsupportedScheme);
    }
    let host = url.host_str().unwrap_or_default();
    if !config.host_allowed(host) {
        return Err(InvalidUrl::HostNotAllowed(host.to_owned()));
    }
    Ok(())
}

fn build_headers(
    defaults: &[(String, String)],
    overrides: &[(String, String)],
) -> Result<HeaderMap, String> {
    let mut map = HeaderMap::new();
    for (name, value) in defaults.iter().chain(overrides.iter()) {
        let header_name = HeaderName::try_from(name.as_str())
            .map_err(|e| format!("invalid header name {name:?}: {e}"))?;
        let header_value = HeaderValue::try_from(value.as_str())
            .map_err(|e| format!("invalid value for header {name:?}: {e}"))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// Failures before any attempt starts (URL policy, header building) still
/// surface as canonical errors and count toward the error metric.
fn terminal_internal_error(tool: &str, detail: String) -> CanonicalError {
    let error = CanonicalError::new(tool, ErrorCode::UnknownError, None, Some(detail), TraceId::ZERO);
    metrics::record_error(tool, error.code.as_str());
    error
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
