//! Retry policy for transient server failures.
//!
//! Only responses with a retryable 5xx status are retried. Transport failures
//! (refused connection, DNS failure, timeout) never reach the policy: they
//! surface immediately as connection errors.

use reqwest::Method;
use std::time::Duration;

/// Maximum number of retries after the first attempt.
pub const MAX_RETRIES: usize = 3;

/// Base backoff in seconds; doubled after each further failure.
pub const BACKOFF_FACTOR: f64 = 1.0;

/// Upper bound for a single backoff sleep.
pub const BACKOFF_MAX: Duration = Duration::from_secs(120);

/// Statuses treated as transient.
pub const RETRY_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Explicit retry policy consulted by the request executor after each attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub backoff_factor: f64,
    pub statuses: Vec<u16>,
    pub methods: Vec<Method>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            backoff_factor: BACKOFF_FACTOR,
            statuses: RETRY_STATUSES.to_vec(),
            methods: vec![Method::GET, Method::POST, Method::PUT, Method::DELETE],
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Same policy without any waiting between attempts.
    pub fn without_backoff(mut self) -> Self {
        self.backoff_factor = 0.0;
        self
    }

    /// Whether a response with `status` should be retried, given how many
    /// retries were already spent.
    pub fn should_retry(&self, method: &Method, status: u16, retries_done: usize) -> bool {
        retries_done < self.max_retries
            && self.methods.contains(method)
            && self.statuses.contains(&status)
    }

    /// Sleep before the next attempt after `consecutive_failures` failed
    /// attempts: nothing after the first, then `factor * 2^(n-1)` seconds.
    pub fn backoff(&self, consecutive_failures: usize) -> Duration {
        if consecutive_failures <= 1 || self.backoff_factor <= 0.0 {
            return Duration::ZERO;
        }
        let exponent = (consecutive_failures - 1).min(32) as i32;
        let secs = self.backoff_factor * 2f64.powi(exponent);
        Duration::from_secs_f64(secs).min(BACKOFF_MAX)
    }

    /// Wait before retrying a response. A 503 carrying `Retry-After` (in
    /// seconds) is honored over the computed backoff.
    pub fn delay_for(
        &self,
        status: u16,
        retry_after: Option<u64>,
        consecutive_failures: usize,
    ) -> Duration {
        if self.backoff_factor <= 0.0 {
            return Duration::ZERO;
        }
        match (status, retry_after) {
            (503, Some(secs)) => Duration::from_secs(secs).min(BACKOFF_MAX),
            _ => self.backoff(consecutive_failures),
        }
    }
}

/// Parses a `Retry-After` header value given in seconds. HTTP-date values
/// are ignored and fall back to the computed backoff.
pub fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}
