// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-process retry for transient provider failures.
//!
//! Transient errors (throttling, timeouts, brief backend outages) are retried
//! with a growing, jittered delay until a per-call deadline passes; permanent
//! errors fail immediately. Retries never span invocations.

use crate::errors::ProviderError;
use rand::RngExt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Delay before the first retry (100ms)
const FIRST_DELAY_MILLIS: u64 = 100;

/// Upper bound on any single delay (5 seconds)
const DELAY_CAP_SECS: u64 = 5;

/// Total time budget for one retried call (30 seconds)
const RETRY_DEADLINE_SECS: u64 = 30;

/// Fraction by which each delay is randomized (±10%)
const JITTER_FRACTION: f64 = 0.1;

/// A sequence of retry delays: doubling from [`FIRST_DELAY_MILLIS`] up to
/// [`DELAY_CAP_SECS`], each randomized by [`JITTER_FRACTION`], until the
/// deadline passes.
///
/// The jitter keeps a burst of failing callers from re-converging on the
/// backend in lockstep.
pub struct RetryDelays {
    /// Point in time after which no more delays are handed out
    deadline: Instant,
    /// Un-jittered length of the next delay
    next: Duration,
}

impl RetryDelays {
    /// A delay sequence with the standard provider-call budget.
    #[must_use]
    pub fn standard() -> Self {
        Self::with_deadline(Duration::from_secs(RETRY_DEADLINE_SECS))
    }

    /// A delay sequence that stops handing out delays once `budget` has
    /// elapsed from now.
    #[must_use]
    pub fn with_deadline(budget: Duration) -> Self {
        Self {
            deadline: Instant::now() + budget,
            next: Duration::from_millis(FIRST_DELAY_MILLIS),
        }
    }

    /// The next delay to sleep, or `None` once the deadline has passed.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if Instant::now() >= self.deadline {
            return None;
        }
        let delay = jittered(self.next);
        self.next = (self.next * 2).min(Duration::from_secs(DELAY_CAP_SECS));
        Some(delay)
    }
}

/// Randomize a delay by ±[`JITTER_FRACTION`].
fn jittered(delay: Duration) -> Duration {
    let secs = delay.as_secs_f64();
    let spread = secs * JITTER_FRACTION;
    let picked = rand::rng().random_range((secs - spread)..=(secs + spread));
    Duration::from_secs_f64(picked.max(0.0))
}

/// Retry a provider call until it succeeds, fails permanently, or the retry
/// budget runs out.
///
/// Classification comes from [`ProviderError::is_transient`]: backend
/// failures are worth another attempt, configuration mistakes (such as an
/// unwired provider) are not.
///
/// # Arguments
///
/// * `operation` - Async function that performs the provider call
/// * `operation_name` - Human-readable name for logging (e.g., "read record")
///
/// # Errors
///
/// Returns the last error when a permanent error is encountered or the
/// deadline passes with the call still failing.
pub async fn retry_provider_call<T, F, Fut>(
    mut operation: F,
    operation_name: &str,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
{
    let mut delays = RetryDelays::standard();
    let started = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?started.elapsed(),
                        "Provider call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                if !e.is_transient() {
                    error!(
                        operation = operation_name,
                        error = %e,
                        "Non-retryable provider error, failing immediately"
                    );
                    return Err(e);
                }

                let Some(delay) = delays.next_delay() else {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?started.elapsed(),
                        error = %e,
                        "Retry budget spent, giving up"
                    );
                    return Err(e);
                };
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    retry_after = ?delay,
                    error = %e,
                    "Transient provider error, will retry"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
