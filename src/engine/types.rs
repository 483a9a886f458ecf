//! Executor types

use crate::transport::Response;
use chrono::{DateTime, Utc};

/// Outcome of one executed call
#[derive(Debug)]
pub struct Execution {
    /// Response as returned by the transport, body untouched
    pub response: Response,
    /// Wall time in seconds, rounded to 6 decimals
    pub duration: f64,
    /// When the transport was invoked
    pub started_at: DateTime<Utc>,
    /// When the transport returned
    pub finished_at: DateTime<Utc>,
    /// HTTP status, 0 when unknown
    pub status_code: u16,
}

impl Execution {
    /// Duration in milliseconds
    pub fn duration_millis(&self) -> f64 {
        self.duration * 1000.0
    }

    /// Split into the response and its duration
    pub fn into_parts(self) -> (Response, f64) {
        (self.response, self.duration)
    }
}

/// Round to a fixed number of decimals
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
