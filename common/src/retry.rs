use anyhow::Result;

/// Listing calls are retried up to this many times in total.
pub const RETRY_ATTEMPTS: u32 = 5;
pub const RETRY_BASE_DELAY: std::time::Duration = std::time::Duration::from_millis(100);

/// Run `operation` until it succeeds or the attempt budget is spent, sleeping
/// with exponential backoff between attempts (100ms, 200ms, 400ms, 800ms).
pub async fn with_retry<ValueType, FutureType, OpType>(
    what: &str,
    mut operation: OpType,
) -> Result<ValueType>
where
    OpType: FnMut() -> FutureType,
    FutureType: std::future::Future<Output = Result<ValueType>>,
{
    let mut delay = RETRY_BASE_DELAY;
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= RETRY_ATTEMPTS {
                    return Err(error.context(format!("{} failed after {} tries", what, attempt)));
                }
                tracing::warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {:#}",
                    what,
                    attempt,
                    RETRY_ATTEMPTS,
                    delay,
                    error
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
        }
    }
}
