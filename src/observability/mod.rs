//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Client request loop produces:
//!     → logging.rs (structured per-phase log events with trace ids)
//!     → metrics.rs (latency histogram, retry/error counters, breaker gauge)
//!
//! Consumers:
//!     → Log aggregation (stdout, file, remote)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging through `tracing`; one span per logical call
//! - Metric emission goes through `record_*` helpers so call sites stay small
//! - Secrets are redacted before headers reach any log line

pub mod logging;
pub mod metrics;
