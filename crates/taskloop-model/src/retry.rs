// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Retry driver.
//!
//! Generalizes `original_source/models/litellm_model.py`'s `retry(...)`
//! context-manager loop (filtered out of the retrieval pack, but its call
//! shape is visible from `litellm_model.py::query`) into an explicit driver
//! that takes an action closure plus an abort predicate — the "retry
//! decorator becomes an explicit retry driver" design note in spec §9.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::{ErrorClass, ModelError};

const BASE_BACKOFF: Duration = Duration::from_secs(4);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Run `attempt` up to `max_attempts` times with exponential backoff and
/// jitter. Returns immediately (no retry) if the error classifies as
/// [`ErrorClass::Abort`].
pub async fn retry<T, F, Fut>(max_attempts: u32, mut attempt: F) -> Result<T, ModelError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ModelError>>,
{
    let mut last_err = None;
    for n in 0..max_attempts.max(1) {
        match attempt().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                if e.class() == ErrorClass::Abort {
                    return Err(e);
                }
                warn!(attempt = n + 1, error = %e, "model query failed, retrying");
                last_err = Some(e);
                if n + 1 < max_attempts {
                    tokio::time::sleep(backoff_delay(n)).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| ModelError::Transient("retry loop ran zero times".into())))
}

/// Exponential backoff with jitter: base 4s, doubling per attempt, capped
/// at 60s, with up to ±25% jitter applied.
fn backoff_delay(attempt: u32) -> Duration {
    let exp = BASE_BACKOFF.saturating_mul(1u32 << attempt.min(16));
    let capped = exp.min(MAX_BACKOFF);
    let jitter_frac = rand::thread_rng().gen_range(0.75..=1.25);
    Duration::from_secs_f64(capped.as_secs_f64() * jitter_frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_on_first_try_without_retry() {
        let calls = AtomicU32::new(0);
        let result = retry(5, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ModelError>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry(5, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ModelError::Transient("boom".into()))
                } else {
                    Ok(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn aborts_immediately_on_authentication_error() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, _> = retry(5, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ModelError::Authentication("bad key".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, _> = retry(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ModelError::Transient("still failing".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn backoff_grows_and_caps() {
        assert!(backoff_delay(0) < backoff_delay(3));
        assert!(backoff_delay(10) <= MAX_BACKOFF.mul_f64(1.25));
    }
}
