//! Request logger
//!
//! Three phases follow a call: `initialize` before it starts,
//! `update_with_result` once the caller's result is known, and `finalize`
//! on every exit path. Nothing here returns an error to the caller; every
//! failure ends up either in the record itself or in the diagnostic log.

use super::record::RequestLog;
use super::render::{LogRender, LogResult, UNCONVERTIBLE};
use super::sink::{LogContext, LogSink, NullLogSink};
use crate::error::Error;
use crate::request::ApiRequest;
use crate::types::{JsonValue, Options};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::backtrace::Backtrace;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Default slow-request threshold
pub const DEFAULT_SLOW_THRESHOLD_MILLIS: u64 = 5000;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Which path a completed call was logged on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// Everything known about a completed call, for diagnostic logging
#[derive(Debug, Clone)]
pub struct RequestTrace<'a> {
    pub client: &'a str,
    pub method: &'a str,
    pub url: &'a str,
    pub options: &'a Options,
    pub status_code: u16,
    pub content: &'a str,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_millis: f64,
}

/// Builds, completes and hands off request logs
#[derive(Clone)]
pub struct RequestLogger {
    sink: Arc<dyn LogSink>,
    context: Option<Arc<dyn LogContext>>,
    slow_threshold_millis: u64,
}

impl RequestLogger {
    /// Create a logger handing records to `sink`
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            context: None,
            slow_threshold_millis: DEFAULT_SLOW_THRESHOLD_MILLIS,
        }
    }

    /// Fill creator fields from `context`
    #[must_use]
    pub fn with_context(mut self, context: Arc<dyn LogContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// Calls slower than this are logged at error level
    #[must_use]
    pub fn with_slow_threshold(mut self, millis: u64) -> Self {
        self.slow_threshold_millis = millis;
        self
    }

    pub fn slow_threshold_millis(&self) -> u64 {
        self.slow_threshold_millis
    }

    /// Start a record. Serialization failures are stored as descriptions.
    pub fn initialize(
        &self,
        method: &str,
        url: &str,
        options: &Options,
        request: &dyn ApiRequest,
    ) -> RequestLog {
        let mut log = RequestLog::new(method, url);

        log.content = Some(match serde_json::to_string(options) {
            Ok(content) => content,
            Err(e) => describe_error(&Error::serialization(e.to_string())),
        });

        log.request_options = match request.request_options() {
            Ok(options) => options,
            Err(e) => Some(Options::new().with("exception", describe_error(&e))),
        };

        if let Some(context) = &self.context {
            log.apply_origin(context.origin());
        }

        log
    }

    /// Store the caller's result on the record
    pub fn update_with_result(&self, log: &mut RequestLog, result: &dyn LogResult) {
        let response = match result.render() {
            LogRender::Structured(Ok(text)) | LogRender::Text(text) => text,
            LogRender::Structured(Err(e)) => describe_error(&Error::serialization(e.to_string())),
            LogRender::Opaque => UNCONVERTIBLE.to_string(),
        };
        log.response = Some(response);
    }

    /// Record the error (if any) and hand the record to the sink.
    /// Persistence failures are logged, never returned.
    pub async fn finalize(&self, mut log: RequestLog, error: Option<&Error>) {
        if let Some(e) = error {
            log.exception = Some(describe_error(e));
        }

        log.scrub();
        let url = log.request_url.clone();

        match self.sink.insert(log).await {
            Ok(()) => debug!(url = %url, "Request log recorded"),
            Err(e) => error!(
                url = %url,
                error = %describe_error(&e),
                "Failed to record request log"
            ),
        }
    }

    /// Log a completed call on the slow or normal path
    pub fn log_request_response(&self, trace: &RequestTrace<'_>) -> Severity {
        #[allow(clippy::cast_precision_loss)]
        let threshold = self.slow_threshold_millis as f64;
        let options = options_for_log(trace.options);

        if trace.duration_millis > threshold {
            let response = json!({
                "status_code": trace.status_code,
                "content": trace.content,
            });
            error!(
                client = trace.client,
                start_time = %trace.started_at.format(TIMESTAMP_FORMAT),
                end_time = %trace.finished_at.format(TIMESTAMP_FORMAT),
                duration = trace.duration_millis,
                method = trace.method,
                url = trace.url,
                options = %options,
                response = %response,
                backtrace = %Backtrace::force_capture(),
                "External API request may have timed out"
            );
            Severity::Error
        } else {
            info!(
                client = trace.client,
                start_time = %trace.started_at.format(TIMESTAMP_FORMAT),
                end_time = %trace.finished_at.format(TIMESTAMP_FORMAT),
                duration = trace.duration_millis,
                method = trace.method,
                url = trace.url,
                options = %options,
                status_code = trace.status_code,
                content = trace.content,
                "External API response received"
            );
            Severity::Info
        }
    }
}

impl Default for RequestLogger {
    fn default() -> Self {
        Self::new(Arc::new(NullLogSink))
    }
}

impl std::fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLogger")
            .field("slow_threshold_millis", &self.slow_threshold_millis)
            .field("has_context", &self.context.is_some())
            .finish_non_exhaustive()
    }
}

/// A record for a call in progress. Dropping it without calling
/// [`finish`](Self::finish) still hands the record off, marked cancelled.
pub struct InFlightLog {
    logger: RequestLogger,
    log: Option<RequestLog>,
}

impl InFlightLog {
    pub fn new(logger: RequestLogger, log: RequestLog) -> Self {
        Self {
            logger,
            log: Some(log),
        }
    }

    /// The record being built
    pub fn log_mut(&mut self) -> Option<&mut RequestLog> {
        self.log.as_mut()
    }

    /// Finalize with the call's outcome
    pub async fn finish(mut self, error: Option<&Error>) {
        if let Some(log) = self.log.take() {
            self.logger.finalize(log, error).await;
        }
    }
}

impl Drop for InFlightLog {
    fn drop(&mut self) {
        let Some(log) = self.log.take() else {
            return;
        };
        let logger = self.logger.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let cancelled = Error::Other("request was cancelled".to_string());
                    logger.finalize(log, Some(&cancelled)).await;
                });
            }
            Err(_) => error!(url = %log.request_url, "Request log dropped outside a runtime"),
        }
    }
}

/// Describe an error with its kind and cause chain
pub fn describe_error(error: &Error) -> String {
    let mut description = format!("{}: {}", error.kind(), error);
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        description.push_str("\nCaused by: ");
        description.push_str(&cause.to_string());
        source = cause.source();
    }
    description
}

fn options_for_log(options: &Options) -> JsonValue {
    options
        .to_json()
        .unwrap_or_else(|e| JsonValue::String(describe_error(&Error::serialization(e.to_string()))))
}
