use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{ProviderError, Result};

/// Backoff schedule in seconds, one entry per retry (not counting the
/// initial attempt).
const BACKOFF_SECS: [u64; 3] = [1, 2, 4];

/// Retries `op` up to `BACKOFF_SECS.len()` additional times, but only when
/// the error's rendered message contains the literal string "503" — any
/// other failure fails fast. Bails out immediately if `cancel` fires
/// during a backoff sleep.
pub async fn retry_on_503<F, Fut>(cancel: &CancellationToken, op: F) -> Result<bot_core::types::ChatResponse>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bot_core::types::ChatResponse>>,
{
    retry_on_503_with_backoff(cancel, &BACKOFF_SECS.map(Duration::from_secs), op).await
}

/// Backoff-parameterized retry loop. Split out from `retry_on_503` so tests
/// can supply a near-zero schedule instead of the real multi-second one.
async fn retry_on_503_with_backoff<F, Fut>(
    cancel: &CancellationToken,
    backoff: &[Duration],
    mut op: F,
) -> Result<bot_core::types::ChatResponse>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bot_core::types::ChatResponse>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(resp) => return Ok(resp),
            Err(err) => {
                let message = err.to_string();
                if !message.contains("503") || attempt as usize >= backoff.len() {
                    if message.contains("503") {
                        return Err(ProviderError::RetriesExhausted {
                            attempts: attempt + 1,
                            last: message,
                        });
                    }
                    return Err(err);
                }
                let delay = backoff[attempt as usize];
                warn!(attempt, delay_ms = delay.as_millis() as u64, "provider returned 503, retrying");
                attempt += 1;
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bot_core::types::{ChatResponse, Usage};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn ok_response() -> ChatResponse {
        ChatResponse {
            text: "ok".into(),
            raw_content: None,
            tool_calls: vec![],
            usage: Usage::default(),
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result = retry_on_503(&cancel, move || {
            calls2.fetch_add(1, Ordering::SeqCst);
            async { Ok(ok_response()) }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_on_503_then_succeeds() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let backoff = [Duration::from_millis(5), Duration::from_millis(5), Duration::from_millis(5)];
        let result = retry_on_503_with_backoff(&cancel, &backoff, move || {
            let n = calls2.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::Api {
                        status: 503,
                        message: "503 Service Unavailable".into(),
                    })
                } else {
                    Ok(ok_response())
                }
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_retries_and_reports_attempts() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let backoff = [Duration::from_millis(5), Duration::from_millis(5)];
        let result = retry_on_503_with_backoff(&cancel, &backoff, move || {
            calls2.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ProviderError::Api {
                    status: 503,
                    message: "503 Service Unavailable".into(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(ProviderError::RetriesExhausted { attempts: 3, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_503_fails_fast() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result = retry_on_503(&cancel, move || {
            calls2.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ProviderError::Api {
                    status: 400,
                    message: "bad request".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
