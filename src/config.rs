//! Client configuration schema.
//!
//! All settings are optional with defaults. `ClientConfig::from_env` reads
//! the documented environment variables once at startup; components receive
//! the resulting struct by value and never consult the process environment
//! themselves, so tests can construct arbitrary configurations directly.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the tool HTTP client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Transport timeout settings.
    pub timeouts: TimeoutConfig,

    /// Retry and backoff settings.
    pub retry: RetryConfig,

    /// Circuit breaker settings.
    pub breaker: BreakerConfig,

    /// Hosts that requests may target. Empty means no restriction.
    pub allowed_hosts: Vec<String>,

    /// Maximum response body size accepted by JSON decoding, in bytes.
    pub validation_limit_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeouts: TimeoutConfig::default(),
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
            allowed_hosts: Vec::new(),
            validation_limit_bytes: 1_048_576,
        }
    }
}

impl ClientConfig {
    /// Build a configuration from environment variables.
    ///
    /// Unset or unparseable variables fall back to their defaults.
    pub fn from_env() -> Self {
        Self {
            timeouts: TimeoutConfig {
                connect_ms: env_u64("HTTP_CONNECT_TIMEOUT_MS", 500),
                read_ms: env_u64("HTTP_TIMEOUT_MS", 1500),
                write_ms: env_u64("HTTP_WRITE_TIMEOUT_MS", 1500),
                pool_ms: env_u64("HTTP_POOL_TIMEOUT_MS", 500),
            },
            retry: RetryConfig {
                max_retries: env_u32("RETRY_MAX", 3),
                base_delay_ms: env_u64("RETRY_BASE_MS", 100).max(1),
                jitter: env_f64("RETRY_JITTER", 0.2).max(0.0),
            },
            breaker: BreakerConfig {
                enabled: env_bool("BREAKER_ENABLED", false),
                failure_threshold: env_f64("BREAKER_THRESH", 0.5),
                window_size: env_usize("BREAKER_WINDOW", 20).max(1),
                cooldown_ms: env_u64("BREAKER_COOLDOWN_MS", 5000),
                half_open_max: env_u32("HALF_OPEN_MAX", 3).max(1),
            },
            allowed_hosts: env_hosts("ALLOWED_HOSTS"),
            validation_limit_bytes: env_usize("HTTP_VALIDATION_LIMIT_BYTES", 1_048_576).max(1),
        }
    }

    /// Whether `host` passes the allow-list.
    pub fn host_allowed(&self, host: &str) -> bool {
        self.allowed_hosts.is_empty() || self.allowed_hosts.iter().any(|h| h == host)
    }
}

/// Timeouts applied by the transport.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// Read timeout in milliseconds.
    pub read_ms: u64,

    /// Write timeout in milliseconds.
    pub write_ms: u64,

    /// Connection pool checkout timeout in milliseconds.
    pub pool_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 500,
            read_ms: 1500,
            write_ms: 1500,
            pool_ms: 500,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }

    pub fn pool(&self) -> Duration {
        Duration::from_millis(self.pool_ms)
    }

    /// Total per-attempt budget. The transport has no distinct write
    /// deadline, so the write allowance folds into the request total.
    pub fn request_total(&self) -> Duration {
        Duration::from_millis(self.read_ms.saturating_add(self.write_ms))
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Jitter fraction; the computed delay is scaled by a uniform factor
    /// in `[1 - jitter, 1 + jitter]`.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            jitter: 0.2,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Enable outcome recording. When false the breaker admits everything.
    pub enabled: bool,

    /// Failure fraction over a full window that trips the breaker.
    pub failure_threshold: f64,

    /// Number of outcomes kept in the sliding window.
    pub window_size: usize,

    /// Cooldown after a trip in milliseconds.
    pub cooldown_ms: u64,

    /// Trial admissions granted while half-open.
    pub half_open_max: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            failure_threshold: 0.5,
            window_size: 20,
            cooldown_ms: 5000,
            half_open_max: 3,
        }
    }
}

impl BreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

fn env_hosts(name: &str) -> Vec<String> {
    std::env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_owned)
        .collect()
}
