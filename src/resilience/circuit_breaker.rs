//! Circuit breaker for tool endpoint protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: endpoint assumed down, requests fail fast
//! - Half-Open: testing if the endpoint recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure fraction >= threshold over a full window
//! Open → Half-Open: first admission check after the cooldown
//! Half-Open → Closed: trial succeeds (window cleared)
//! Half-Open → Open: trial fails (cooldown re-armed immediately)
//! ```
//!
//! # Design Decisions
//! - Per-tool breaker, shared by every client using that tool identity
//! - Fail fast in Open state, no network call is made
//! - A success while probing discards the prior failure history
//! - Half-open trial budget is consumed per admission check, so concurrent
//!   probes can exhaust it before any outcome resolves

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::config::BreakerConfig;
use crate::observability::metrics;

/// Breaker states, also returned by admission checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    /// Sliding window of outcomes, `true` = failure, newest first.
    window: VecDeque<bool>,
    cooldown_expires_at: Option<Instant>,
    half_open_remaining: u32,
}

/// Per-tool breaker state machine.
///
/// All mutation happens under the internal mutex; admission checks and
/// outcome recordings for the same tool never race.
#[derive(Debug)]
pub struct CircuitBreaker {
    tool: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(tool: &str, config: BreakerConfig) -> Self {
        metrics::record_breaker_state(tool, false);
        let window_size = config.window_size.max(1);
        Self {
            tool: tool.to_owned(),
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                window: VecDeque::with_capacity(window_size),
                cooldown_expires_at: None,
                half_open_remaining: 0,
            }),
        }
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Admission check performed before every network attempt.
    ///
    /// Returns the state the attempt is admitted under; `Open` means the
    /// attempt is rejected. The first check after the cooldown promotes the
    /// breaker to half-open and grants the trial budget; each half-open
    /// check consumes one unit of it.
    pub fn allow(&self) -> BreakerState {
        let mut inner = lock_unpoisoned(&self.inner);
        if inner.state == BreakerState::Open {
            let cooled_down = inner
                .cooldown_expires_at
                .is_some_and(|expires| Instant::now() >= expires);
            if cooled_down {
                self.set_state(&mut inner, BreakerState::HalfOpen);
                inner.half_open_remaining = self.config.half_open_max;
            } else {
                return BreakerState::Open;
            }
        }
        if inner.state == BreakerState::HalfOpen {
            if inner.half_open_remaining == 0 {
                return BreakerState::Open;
            }
            inner.half_open_remaining -= 1;
            return BreakerState::HalfOpen;
        }
        BreakerState::Closed
    }

    /// Record the outcome of a completed attempt.
    ///
    /// No-op while the breaker is disabled.
    pub fn record(&self, success: bool) {
        if !self.config.enabled {
            return;
        }
        let mut inner = lock_unpoisoned(&self.inner);

        if inner.window.len() >= self.config.window_size.max(1) {
            inner.window.pop_back();
        }
        inner.window.push_front(!success);

        if success {
            if matches!(inner.state, BreakerState::HalfOpen | BreakerState::Open) {
                self.set_state(&mut inner, BreakerState::Closed);
                inner.window.clear();
            }
            return;
        }

        if inner.state == BreakerState::HalfOpen {
            self.trip(&mut inner);
            return;
        }

        let total = inner.window.len();
        if total >= self.config.window_size {
            let failures = inner.window.iter().filter(|failed| **failed).count();
            if failures as f64 / total as f64 >= self.config.failure_threshold {
                self.trip(&mut inner);
            }
        }
    }

    /// Current state without consuming half-open budget.
    pub fn state(&self) -> BreakerState {
        lock_unpoisoned(&self.inner).state
    }

    fn trip(&self, inner: &mut BreakerInner) {
        inner.cooldown_expires_at = Some(Instant::now() + self.config.cooldown());
        self.set_state(inner, BreakerState::Open);
        tracing::warn!(tool = %self.tool, cooldown_ms = self.config.cooldown_ms, "Circuit breaker tripped");
    }

    fn set_state(&self, inner: &mut BreakerInner, state: BreakerState) {
        inner.state = state;
        metrics::record_breaker_state(&self.tool, state == BreakerState::Open);
    }
}

/// Explicitly owned registry mapping tool identities to breakers.
///
/// One registry per process (or per test harness); clients borrow breakers
/// lazily on first use, and every client using the same tool identity
/// shares the same breaker instance.
#[derive(Debug, Clone)]
pub struct BreakerRegistry {
    config: BreakerConfig,
    inner: Arc<DashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Arc::new(DashMap::new()),
        }
    }

    pub fn breaker_for(&self, tool: &str) -> Arc<CircuitBreaker> {
        self.inner
            .entry(tool.to_owned())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(tool, self.config.clone())))
            .clone()
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
