//! Transport seam between the client core and the wire.
//!
//! A [`Transport`] sends exactly one HTTP request and returns the raw
//! status, headers and fully-read body. It never follows redirects; the
//! client core handles those manually. Failures surface as a closed set of
//! categories so the error model can match on tags instead of library
//! error types.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::TimeoutConfig;

/// A single outbound request, already resolved and validated.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Per-call override; `None` uses the transport's configured total.
    pub timeout: Option<Duration>,
}

/// A raw response with the body read to completion.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Closed set of transport failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportFailureKind {
    /// Connect/read/write deadline exceeded.
    Timeout,
    /// Connection could not be established.
    Connect,
    /// Any other failure on an established exchange.
    Transport,
    /// Failures outside the transport proper (request building, policy).
    Other,
}

/// A transport-level failure with its category tag.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportFailure {
    pub kind: TransportFailureKind,
    pub message: String,
}

impl TransportFailure {
    pub fn new(kind: TransportFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn from_reqwest(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            TransportFailureKind::Timeout
        } else if error.is_connect() {
            TransportFailureKind::Connect
        } else if error.is_request() || error.is_body() || error.is_decode() {
            TransportFailureKind::Transport
        } else {
            TransportFailureKind::Other
        };
        Self::new(kind, error.to_string())
    }
}

/// One request in, one raw response (or categorized failure) out.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportFailure>;
}

/// Production transport backed by a pooled `reqwest` client.
///
/// Redirect following is disabled; the client core implements the redirect
/// policy itself.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeouts: &TimeoutConfig) -> Result<Self, TransportFailure> {
        let inner = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(timeouts.connect())
            .read_timeout(timeouts.read())
            .timeout(timeouts.request_total())
            .pool_idle_timeout(timeouts.pool())
            .build()
            .map_err(|e| TransportFailure::new(TransportFailureKind::Other, e.to_string()))?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportFailure> {
        let mut builder = self
            .inner
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(TransportFailure::from_reqwest)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(TransportFailure::from_reqwest)?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

/// Process-wide transport lifecycle.
///
/// The pooled client is built lazily under a mutex on first use and reused
/// by every client instance without a transport override. `shutdown` drops
/// the pool; a later call rebuilds it.
#[derive(Debug)]
pub struct SharedTransport {
    timeouts: TimeoutConfig,
    slot: tokio::sync::Mutex<Option<Arc<ReqwestTransport>>>,
}

impl SharedTransport {
    pub fn new(timeouts: TimeoutConfig) -> Self {
        Self {
            timeouts,
            slot: tokio::sync::Mutex::new(None),
        }
    }

    pub async fn get_or_create(&self) -> Result<Arc<ReqwestTransport>, TransportFailure> {
        let mut slot = self.slot.lock().await;
        if let Some(existing) = slot.as_ref() {
            return Ok(existing.clone());
        }
        let created = Arc::new(ReqwestTransport::new(&self.timeouts)?);
        *slot = Some(created.clone());
        tracing::debug!("Shared HTTP transport initialized");
        Ok(created)
    }

    pub async fn shutdown(&self) {
        if self.slot.lock().await.take().is_some() {
            tracing::debug!("Shared HTTP transport shut down");
        }
    }
}
