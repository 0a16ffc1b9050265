use std::future::Future;

use crate::{
    config::RetryConfig,
    error::Result,
    generation_event,
    logger::{self, LogLevel},
    models::GenerationOutcome,
};

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `max_retries` extra attempts have been spent.
pub async fn with_retry<F, Fut, T>(retry: &RetryConfig, scene: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                attempt += 1;
                let delay = retry.delay_for(attempt);
                logger::record(
                    generation_event!(
                        LogLevel::Warn,
                        scene,
                        GenerationOutcome::Retrying,
                        format!(
                            "Attempt {}/{} failed, retrying in {:?}: {}",
                            attempt,
                            retry.max_retries + 1,
                            delay,
                            e
                        ),
                    )
                    .with_context("attempt", attempt),
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
