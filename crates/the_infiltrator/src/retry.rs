//! Exponential backoff with jitter, capped retry count, honoring
//! `Retry-After` when present. Applies per-page, not per-job.
//!
//! Constants grounded on `examples/original_source/Data_Sample_Connectors/common.py`'s
//! `Retry(total=5, backoff_factor=0.5, status_forcelist=[429, 500, 502, 503, 504])`:
//! total retry cap 5, backoff doubling 0.5s/1s/2s/4s/8s, the same status set.

use rand::Rng;
use std::time::Duration;

use crate::error::ClientError;

pub const MAX_RETRIES: u32 = 5;
pub const BACKOFF_FACTOR_SECS: f64 = 0.5;
pub const RETRIED_STATUS_CODES: &[u16] = &[429, 500, 502, 503, 504];

/// Backoff delay for retry attempt `n` (0-indexed), with up to 20% jitter.
pub fn backoff_delay(attempt: u32) -> Duration {
    let base = BACKOFF_FACTOR_SECS * 2f64.powi(attempt as i32);
    let jitter = rand::thread_rng().gen_range(0.0..base * 0.2);
    Duration::from_secs_f64(base + jitter)
}

/// Retry an async operation up to `MAX_RETRIES` times, sleeping according to
/// [`backoff_delay`] (or the upstream's `Retry-After` hint when the error
/// carries one) between attempts. Permanent and malformed-payload errors are
/// never retried.
pub async fn with_retry<F, Fut, T>(mut op: F) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if attempt >= MAX_RETRIES => return Err(e),
            Err(ClientError::RateLimited { retry_after }) => {
                tracing::warn!(attempt, ?retry_after, "rate limited, backing off");
                tokio::time::sleep(retry_after).await;
                attempt += 1;
            }
            Err(e) => {
                let delay = backoff_delay(attempt);
                tracing::warn!(attempt, ?delay, error = %e, "retrying after transient error");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delay_doubles() {
        let d0 = backoff_delay(0).as_secs_f64();
        let d1 = backoff_delay(1).as_secs_f64();
        // d0 in [0.5, 0.6), d1 in [1.0, 1.2)
        assert!(d0 >= 0.5 && d0 < 0.6);
        assert!(d1 >= 1.0 && d1 < 1.2);
    }

    #[tokio::test]
    async fn test_with_retry_succeeds_after_transient_failures() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result = with_retry(|| {
            let n = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ClientError::Retryable("boom".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_retry_never_retries_permanent() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result: Result<i32, ClientError> = with_retry(|| {
            attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async { Err(ClientError::Permanent("nope".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
