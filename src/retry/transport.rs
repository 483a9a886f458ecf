//! Retry decorator

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::transport::{Response, Transport};
use crate::types::{BackoffType, ByteStream, Options};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Decorator retrying transient failures with backoff
pub struct RetryTransport {
    inner: Arc<dyn Transport>,
    max_retries: u32,
    config: RetryConfig,
}

impl RetryTransport {
    /// Wrap `inner`, allowing up to `max_retries` extra attempts
    pub fn new(inner: Arc<dyn Transport>, max_retries: u32, config: RetryConfig) -> Self {
        Self {
            inner,
            max_retries,
            config,
        }
    }

    /// Maximum number of retries after the first attempt
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Calculate backoff delay for the given attempt (0-based)
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let initial = self.config.initial_backoff();
        let delay = match self.config.backoff_type {
            BackoffType::Constant => initial,
            BackoffType::Linear => initial.saturating_mul(attempt.saturating_add(1)),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                initial.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.config.max_backoff())
    }

    fn should_retry_status(&self, status: u16) -> bool {
        self.config.retry_statuses.contains(&status)
    }

    /// Delay before retrying `response`. A `Retry-After` in seconds wins over
    /// the backoff curve, capped by the maximum backoff.
    fn delay_for(&self, response: &Response, attempt: u32) -> Duration {
        match response
            .header("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            Some(seconds) => std::cmp::min(Duration::from_secs(seconds), self.config.max_backoff()),
            None => self.calculate_backoff(attempt),
        }
    }
}

#[async_trait]
impl Transport for RetryTransport {
    async fn request(&self, method: &str, url: &str, options: Options) -> Result<Response> {
        let mut attempt = 0;

        loop {
            match self.inner.request(method, url, options.clone()).await {
                Ok(response) => {
                    let status = response.status_code();
                    if !self.should_retry_status(status) || attempt >= self.max_retries {
                        if attempt > 0 {
                            debug!(method, url, status, attempts = attempt + 1, "RetryTransport finished");
                        }
                        return Ok(response);
                    }

                    let delay = self.delay_for(&response, attempt);
                    warn!(
                        method,
                        url,
                        status,
                        attempt = attempt + 1,
                        max_attempts = self.max_retries + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Request returned retryable status, retrying"
                    );
                    drop(response);
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.calculate_backoff(attempt);
                    warn!(
                        method,
                        url,
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts = self.max_retries + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(retry_exhausted(e, attempt)),
            }
            attempt += 1;
        }
    }

    fn stream(&self, response: Response) -> ByteStream {
        self.inner.stream(response)
    }

    fn with_options(&self, options: Options) -> Arc<dyn Transport> {
        Arc::new(Self {
            inner: self.inner.with_options(options),
            max_retries: self.max_retries,
            config: self.config.clone(),
        })
    }
}

fn retry_exhausted(error: Error, attempt: u32) -> Error {
    if attempt > 0 {
        debug!(error = %error, attempts = attempt + 1, "RetryTransport giving up");
    }
    error
}
