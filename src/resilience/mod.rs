//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request attempt:
//!     → circuit_breaker.rs (admission check before any network call)
//!     → On failure: retries.rs (classify outcome, gate on idempotency)
//!     → backoff.rs (compute delay, honor Retry-After)
//!     → circuit_breaker.rs (record outcome into the sliding window)
//! ```
//!
//! # Design Decisions
//! - Breakers are keyed by tool identity, not global
//! - Failures are recorded before the retry decision, so they count toward
//!   the breaker window whether or not the attempt is retried
//! - Retries only for idempotent calls; timeout-class transport failures
//!   bypass the gate since no side effect is assumed

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
