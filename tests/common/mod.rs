//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tool_client::config::{BreakerConfig, ClientConfig, RetryConfig};
use tool_client::transport::{
    Transport, TransportFailure, TransportFailureKind, TransportRequest, TransportResponse,
};
use tool_client::{ClientFactory, HttpClient};

/// One scripted transport exchange.
#[derive(Debug, Clone)]
pub enum Outcome {
    Response(TransportResponse),
    Failure(TransportFailure),
}

/// Scripted transport: pops one outcome per send and records every request
/// it receives, so tests can assert on attempt counts, redirect targets and
/// rewritten methods.
pub struct MockTransport {
    script: Mutex<VecDeque<Outcome>>,
    calls: AtomicU32,
    requests: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    pub fn new(outcomes: Vec<Outcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(outcomes.into()),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        match self.script.lock().unwrap().pop_front() {
            Some(Outcome::Response(response)) => Ok(response),
            Some(Outcome::Failure(failure)) => Err(failure),
            None => panic!("mock transport script exhausted"),
        }
    }
}

pub fn response(status: u16, body: &str) -> Outcome {
    response_with_headers(status, &[], body)
}

pub fn response_with_headers(status: u16, headers: &[(&str, &str)], body: &str) -> Outcome {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.insert(
            HeaderName::try_from(*name).unwrap(),
            HeaderValue::try_from(*value).unwrap(),
        );
    }
    Outcome::Response(TransportResponse {
        status: StatusCode::from_u16(status).unwrap(),
        headers: map,
        body: Bytes::from(body.to_owned()),
    })
}

pub fn redirect(status: u16, location: &str) -> Outcome {
    response_with_headers(status, &[("location", location)], "")
}

pub fn failure(kind: TransportFailureKind) -> Outcome {
    Outcome::Failure(TransportFailure::new(kind, "injected failure"))
}

/// Config with near-zero backoff so retry tests run fast.
pub fn fast_config() -> ClientConfig {
    ClientConfig {
        retry: RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            jitter: 0.0,
        },
        ..ClientConfig::default()
    }
}

/// Breaker-enabled config with retries off, so every failing call records
/// exactly one outcome.
pub fn breaker_config(window_size: usize, cooldown_ms: u64, half_open_max: u32) -> ClientConfig {
    ClientConfig {
        retry: RetryConfig {
            max_retries: 0,
            base_delay_ms: 1,
            jitter: 0.0,
        },
        breaker: BreakerConfig {
            enabled: true,
            failure_threshold: 0.5,
            window_size,
            cooldown_ms,
            half_open_max,
        },
        ..ClientConfig::default()
    }
}

/// Build a client for `tool` wired to a scripted transport.
pub fn client_with(
    tool: &str,
    config: ClientConfig,
    outcomes: Vec<Outcome>,
) -> (HttpClient, Arc<MockTransport>) {
    let factory = ClientFactory::new(config);
    let mock = MockTransport::new(outcomes);
    let client = factory
        .client_with_transport(tool, "https://tool.example", mock.clone())
        .expect("base URL is valid");
    (client.with_jitter_seed(42), mock)
}
