// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Attempt budgets and pacing for engine and state-store calls.
//!
//! Two shapes are in use:
//!
//! - [`RetryConfig::admin`]: index create/delete/exists, mapping puts and
//!   backend connects. A short exponential backoff, then the error surfaces.
//! - [`RetryConfig::bulk`]: pacing between bulk rounds. The indexer drives
//!   the rounds itself because each one resubmits a smaller item set, so it
//!   only asks the policy how long to wait before a given attempt.
//!
//! # Example
//!
//! ```
//! use search_sync::RetryConfig;
//! use std::time::Duration;
//!
//! let admin = RetryConfig::admin();
//! assert_eq!(admin.attempts, 3);
//! assert_eq!(admin.delay_for(3), Duration::from_millis(400));
//!
//! let bulk = RetryConfig::bulk(5, Duration::from_millis(250));
//! assert_eq!(bulk.delay_for(1), Duration::ZERO);
//! assert_eq!(bulk.delay_for(4), Duration::from_millis(250));
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// How many times to try, and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, the first one included. Never below 1.
    pub attempts: usize,
    /// Wait before the second attempt
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Growth of the wait per further attempt
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::admin()
    }
}

impl RetryConfig {
    #[must_use]
    pub fn admin() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }

    /// `attempts` rounds with a constant `delay` between them.
    #[must_use]
    pub fn bulk(attempts: usize, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
        }
    }

    /// Wait before `attempt` (1-based). The first attempt goes out at once.
    #[must_use]
    pub fn delay_for(&self, attempt: usize) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        (2..attempt).fold(self.initial_delay, |delay, _| {
            delay.mul_f64(self.multiplier).min(self.max_delay)
        })
    }

    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            multiplier: 2.0,
        }
    }
}

/// Run `operation` until it succeeds or the attempt budget is spent.
/// The last error is returned unchanged.
pub async fn retry<F, Fut, T, E>(label: &str, policy: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation = label, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if attempt >= attempts => {
                warn!(operation = label, attempts, error = %err, "Giving up");
                return Err(err);
            }
            Err(err) => {
                attempt += 1;
                let wait = policy.delay_for(attempt);
                warn!(operation = label, attempt, of = attempts, error = %err, ?wait, "Retrying");
                sleep(wait).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_first_success_needs_one_call() {
        let calls = AtomicUsize::new(0);
        let result: Result<&str, String> = retry("exists", &RetryConfig::test(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok("green") }
        })
        .await;
        assert_eq!(result.unwrap(), "green");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_within_budget() {
        let calls = AtomicUsize::new(0);
        let result: Result<u16, String> = retry("put_mapping", &RetryConfig::test(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(format!("503 on try {}", n))
                } else {
                    Ok(200)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 200);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_last_error_surfaces() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), String> = retry("delete_index", &RetryConfig::test(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err(format!("refused {}", n)) }
        })
        .await;
        assert_eq!(result.unwrap_err(), "refused 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_admin_backoff_is_capped() {
        let policy = RetryConfig {
            attempts: 6,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            multiplier: 2.0,
        };
        let waits: Vec<_> = (1..=5).map(|a| policy.delay_for(a).as_millis()).collect();
        assert_eq!(waits, vec![0, 100, 200, 300, 300]);
    }

    #[test]
    fn test_bulk_pacing_is_constant() {
        let policy = RetryConfig::bulk(0, Duration::from_millis(50));
        assert_eq!(policy.attempts, 1);
        assert_eq!(policy.delay_for(2), Duration::from_millis(50));
        assert_eq!(policy.delay_for(9), Duration::from_millis(50));
    }
}
