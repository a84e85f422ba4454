// src/retry.rs
//
// Bounded retry with exponential backoff and jitter, shared by every
// retryable storage operation: chunk uploads, multipart initiate/complete,
// blocklist commits, and source stream opens. Transport errors and HTTP
// errors of any class are retried identically up to the cap; escalation
// beyond the cap is the caller's object-level failure.

use anyhow::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::constants::{
    MAX_RETRY_ATTEMPTS, RETRY_BACKOFF_CAP_ATTEMPT, RETRY_BASE_DELAY_MS, RETRY_JITTER_MS,
};

/// Delay before retrying after failed attempt `attempt` (1-based):
/// `base * 2^(attempt-1)` plus random jitter, growth capped at attempt 5.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.min(RETRY_BACKOFF_CAP_ATTEMPT).saturating_sub(1);
    let base = RETRY_BASE_DELAY_MS << exponent;
    let jitter = rand::rng().random_range(0..RETRY_JITTER_MS);
    Duration::from_millis(base + jitter)
}

/// Run `make_fut` up to `MAX_RETRY_ATTEMPTS` times, sleeping between
/// failures. The sleep is an async suspension; no thread blocks on it.
pub async fn with_retries<T, F, Fut>(op_name: &str, mut make_fut: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1u32;
    loop {
        match make_fut().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < MAX_RETRY_ATTEMPTS => {
                let delay = backoff_delay(attempt);
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    op_name, attempt, MAX_RETRY_ATTEMPTS, delay, err
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
