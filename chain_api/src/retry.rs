use core::{future::Future, time::Duration};

use log::{debug, warn};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, FetchError};

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub timeout_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            timeout_backoff: Duration::from_secs(2),
        }
    }
}

/// Runs `request` until it succeeds or `policy.max_attempts` is reached.
///
/// Only timeouts are followed by a pause. Other transient failures are retried right away.
/// Empty and undecodable responses are not retried.
pub async fn retry<T, F, Fut>(
    policy: RetryPolicy,
    key: &str,
    token: &CancellationToken,
    mut request: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, ApiError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let cancelled = || FetchError::Cancelled {
        key: key.to_owned(),
    };

    for attempt in 1..=max_attempts {
        let response = tokio::select! {
            () = token.cancelled() => return Err(cancelled()),
            response = request() => response,
        };

        let error = match response {
            Ok(Some(value)) => {
                if attempt > 1 {
                    debug!("{key} succeeded on attempt {attempt}");
                }

                return Ok(value);
            }
            Ok(None) => {
                return Err(FetchError::EmptyResponse {
                    key: key.to_owned(),
                })
            }
            Err(ApiError::Decode { message }) => {
                return Err(FetchError::Decode {
                    key: key.to_owned(),
                    message,
                })
            }
            Err(error) => error,
        };

        if attempt == max_attempts {
            warn!("giving up on {key} after {attempt} attempts: {error}");

            return Err(if error.is_timeout() {
                FetchError::Timeout {
                    key: key.to_owned(),
                    attempts: attempt,
                }
            } else {
                FetchError::Exhausted {
                    key: key.to_owned(),
                    attempts: attempt,
                    source: error,
                }
            });
        }

        warn!("retrying request {key} (attempt {attempt}/{max_attempts}): {error}");

        if error.is_timeout() {
            tokio::select! {
                () = token.cancelled() => return Err(cancelled()),
                () = sleep(policy.timeout_backoff) => {}
            }
        }
    }

    Err(cancelled())
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicUsize, Ordering};

    use test_case::test_case;
    use tokio::time::Instant;

    use super::*;

    const POLICY: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        timeout_backoff: Duration::from_secs(2),
    };

    async fn run(failures: Vec<ApiError>) -> (Result<u64, FetchError>, usize) {
        let calls = AtomicUsize::new(0);
        let token = CancellationToken::new();

        let result = retry(POLICY, "test=1", &token, || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            let response = failures.get(call).cloned().map_or(Ok(Some(7)), Err);
            async move { response }
        })
        .await;

        (result, calls.load(Ordering::SeqCst))
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_are_retried_with_backoff() {
        let start = Instant::now();
        let (result, calls) = run(vec![ApiError::Timeout, ApiError::Timeout]).await;

        assert_eq!(result.ok(), Some(7));
        assert_eq!(calls, 3);
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn other_failures_are_retried_immediately() {
        let start = Instant::now();
        let (result, calls) = run(vec![ApiError::NotFound, ApiError::NotFound]).await;

        assert_eq!(result.ok(), Some(7));
        assert_eq!(calls, 3);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test_case(vec![ApiError::Timeout; 3], "timeout"; "timeouts exhaust into timeout")]
    #[test_case(
        vec![ApiError::Timeout, ApiError::Timeout, ApiError::NotFound],
        "exhausted";
        "last failure decides"
    )]
    #[test_case(
        vec![ApiError::Decode { message: "bad ssz".to_owned() }],
        "decode";
        "decode failure is permanent"
    )]
    #[tokio::test(start_paused = true)]
    async fn failures_are_typed(failures: Vec<ApiError>, expected: &str) {
        let attempts_allowed = failures.len().min(POLICY.max_attempts);
        let (result, calls) = run(failures).await;

        let actual = match result {
            Err(FetchError::Timeout { attempts: 3, .. }) => "timeout",
            Err(FetchError::Exhausted { attempts: 3, .. }) => "exhausted",
            Err(FetchError::Decode { .. }) => "decode",
            _ => "unexpected",
        };

        assert_eq!(calls, attempts_allowed);
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn empty_response_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let token = CancellationToken::new();

        let result = retry(POLICY, "state=3", &token, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<Option<u64>, _>(None) }
        })
        .await;

        assert!(matches!(result, Err(FetchError::EmptyResponse { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let token = CancellationToken::new();
        let canceller = token.clone();

        tokio::spawn(async move {
            sleep(Duration::from_millis(500)).await;
            canceller.cancel();
        });

        let start = Instant::now();

        let result = retry(POLICY, "state=4", &token, || async {
            Err::<Option<u64>, _>(ApiError::Timeout)
        })
        .await;

        assert!(matches!(result, Err(FetchError::Cancelled { .. })));
        assert!(start.elapsed() < POLICY.timeout_backoff);
    }
}
