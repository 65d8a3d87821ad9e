//! Resilient HTTP client for tool endpoints.
//!
//! Outbound calls to external tool services go through one request loop:
//! circuit breaker admission, a single transport send with manual redirect
//! handling, outcome classification, bounded retries with jittered backoff,
//! and canonical error mapping. Latency, retries, errors and breaker state
//! are reported through `tracing` and the `metrics` facade.
//!
//! ```no_run
//! use tool_client::{ClientFactory, ClientConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let factory = ClientFactory::new(ClientConfig::from_env());
//! let github = factory.client("github", "https://api.github.example")?;
//! let body = github.get("/repos/acme/widgets").send_json().await?;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

// Core subsystems
pub mod client;
pub mod config;
pub mod error;
pub mod transport;

// Cross-cutting concerns
pub mod observability;
pub mod resilience;

pub use client::{ClientFactory, HttpClient, InvalidUrl, RequestBuilder, ToolResponse};
pub use config::ClientConfig;
pub use error::{CanonicalError, ErrorCode};
pub use observability::logging::TraceId;
pub use resilience::circuit_breaker::{BreakerRegistry, BreakerState, CircuitBreaker};
pub use transport::{Transport, TransportFailure, TransportFailureKind};
