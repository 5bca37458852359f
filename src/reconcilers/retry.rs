// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff.
//!
//! Two layers retry transient failures:
//!
//! - Individual DigitalOcean API calls retry 429/5xx and network errors with a
//!   short in-call [`ExponentialBackoff`] and fail fast on other 4xx errors.
//! - Failed reconciles are requeued by the controller error policy with a
//!   per-object delay from [`ErrorBackoff`], which grows on every consecutive
//!   failure and resets once the object reconciles cleanly.

use crate::constants::{
    ERROR_BACKOFF_BASE_SECS, ERROR_BACKOFF_EXPIRY_SECS, ERROR_BACKOFF_MAX_SECS,
    THROTTLED_REQUEUE_MAX_SECS, THROTTLED_REQUEUE_MIN_SECS,
};
use rand::Rng;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// HTTP retry initial interval (50ms) - faster than Kubernetes API
const HTTP_INITIAL_INTERVAL_MILLIS: u64 = 50;

/// HTTP retry maximum interval (10 seconds) - shorter than Kubernetes API
const HTTP_MAX_INTERVAL_SECS: u64 = 10;

/// HTTP retry maximum elapsed time (2 minutes) - shorter than Kubernetes API
const HTTP_MAX_ELAPSED_TIME_SECS: u64 = 120;

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter) to prevent thundering herd.
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Initial interval duration (stored for potential reset functionality)
    #[allow(dead_code)]
    pub initial_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Maximum total elapsed time
    pub max_elapsed_time: Option<Duration>,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
    /// Start time for tracking total elapsed time
    start_time: Instant,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff with specified parameters.
    fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_elapsed_time: Option<Duration>,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            initial_interval,
            max_interval,
            max_elapsed_time,
            multiplier,
            randomization_factor,
            start_time: Instant::now(),
        }
    }

    /// Get the next backoff interval, or None if max elapsed time exceeded.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        // Check if we've exceeded max elapsed time
        if let Some(max_elapsed) = self.max_elapsed_time {
            if self.start_time.elapsed() >= max_elapsed {
                return None;
            }
        }

        // Get current interval with jitter
        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        // Calculate next interval (exponential growth)
        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(jittered)
    }

    /// Apply randomization (jitter) to an interval.
    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let min = secs - delta;
        let max = secs + delta;

        let jittered = rand::rng().random_range(min..=max);

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Create exponential backoff configuration for HTTP API retries.
///
/// DigitalOcean API calls use faster retry cycles than the Kubernetes API: a
/// reconcile that keeps failing is better requeued than blocked in-call.
///
/// # Configuration
///
/// - **Initial interval**: 50ms
/// - **Max interval**: 10 seconds
/// - **Max elapsed time**: 2 minutes total
/// - **Multiplier**: 2.0 (exponential growth)
/// - **Randomization**: ±10% (prevents thundering herd)
///
/// # Retry Schedule
///
/// With these settings, retries occur at approximately:
///
/// 1. 50ms
/// 2. 100ms
/// 3. 200ms
/// 4. 400ms
/// 5. 800ms
/// 6. 1.6s
/// 7. 3.2s
/// 8. 6.4s
/// 9. 10s (capped at max interval)
///    10-12. 10s intervals until 2 minutes elapsed
///
/// # Returns
///
/// Configured `ExponentialBackoff` instance
#[must_use]
pub fn http_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(HTTP_INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(HTTP_MAX_INTERVAL_SECS),
        Some(Duration::from_secs(HTTP_MAX_ELAPSED_TIME_SECS)),
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Determine if an HTTP status code is retryable.
///
/// # Retryable Status Codes
///
/// - **429** (Too Many Requests) - Rate limiting
/// - **500** (Internal Server Error) - Server error
/// - **502** (Bad Gateway) - Proxy/gateway error
/// - **503** (Service Unavailable) - Temporary unavailability
/// - **504** (Gateway Timeout) - Gateway timeout
///
/// # Arguments
///
/// * `status` - The HTTP status code to check
///
/// # Returns
///
/// `true` if the status code indicates a transient error, `false` otherwise
#[must_use]
pub fn is_retryable_http_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Per-object exponential backoff for failed reconciles.
///
/// Keys are `{kind}/{namespace}/{name}`. The delay doubles with every
/// consecutive failure of the same key, from [`ERROR_BACKOFF_BASE_SECS`] up to
/// [`ERROR_BACKOFF_MAX_SECS`], with ±10% jitter. Keys that have not failed for
/// [`ERROR_BACKOFF_EXPIRY_SECS`] are dropped, so objects deleted mid-failure
/// do not linger.
#[derive(Debug)]
pub struct ErrorBackoff {
    failures: Mutex<HashMap<String, (u32, Instant)>>,
    expiry: Duration,
}

impl Default for ErrorBackoff {
    fn default() -> Self {
        Self::with_expiry(Duration::from_secs(ERROR_BACKOFF_EXPIRY_SECS))
    }
}

impl ErrorBackoff {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Backoff forgetting keys idle for longer than `expiry`.
    #[must_use]
    pub fn with_expiry(expiry: Duration) -> Self {
        Self {
            failures: Mutex::default(),
            expiry,
        }
    }

    /// Record a failure of `key` and return the delay before the next attempt.
    pub fn next_delay(&self, key: &str) -> Duration {
        let attempts = {
            let mut failures = self
                .failures
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            failures.retain(|_, (_, last)| last.elapsed() < self.expiry);
            let entry = failures
                .entry(key.to_string())
                .or_insert((0, Instant::now()));
            entry.0 = entry.0.saturating_add(1);
            entry.1 = Instant::now();
            entry.0
        };
        jitter(error_delay(attempts), RANDOMIZATION_FACTOR)
    }

    /// Forget the failure history of `key` after a successful reconcile.
    pub fn reset(&self, key: &str) {
        self.failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(key);
    }

    /// Number of keys with recorded failures.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

/// Consecutive failures currently recorded for `key`.
    #[must_use]
    pub fn failures(&self, key: &str) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .map_or(0, |(count, _)| *count)
    }
}

/// Un-jittered delay after `attempts` consecutive failures.
#[must_use]
pub fn error_delay(attempts: u32) -> Duration {
    let exponent = attempts.saturating_sub(1).min(16);
    let secs = ERROR_BACKOFF_BASE_SECS.saturating_mul(1u64 << exponent);
    Duration::from_secs(secs.min(ERROR_BACKOFF_MAX_SECS))
}

/// Requeue delay after the DigitalOcean API throttled a reconcile.
#[must_use]
pub fn throttled_requeue() -> Duration {
    Duration::from_secs(
        rand::rng().random_range(THROTTLED_REQUEUE_MIN_SECS..=THROTTLED_REQUEUE_MAX_SECS),
    )
}

fn jitter(interval: Duration, factor: f64) -> Duration {
    let secs = interval.as_secs_f64();
    let delta = secs * factor;
    Duration::from_secs_f64(rand::rng().random_range((secs - delta)..=(secs + delta)).max(0.0))
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
