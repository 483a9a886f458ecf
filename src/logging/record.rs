//! Audit record for one request

use crate::engine::round_to;
use crate::types::{OptionValue, Options};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who issued a request, filled from the surrounding service context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub user: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Durable log entry describing one request's lifecycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestLog {
    pub method: String,
    pub request_url: String,
    /// Serialized transport options, or an error description
    pub content: Option<String>,
    /// The request's own declared options
    pub request_options: Option<Options>,
    pub response: Option<String>,
    pub exception: Option<String>,
    /// Seconds, 2 decimals
    pub duration: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub created_from_ip: Option<String>,
    pub created_from_ua: Option<String>,
}

impl RequestLog {
    /// Start a record for a call
    pub fn new(method: impl Into<String>, request_url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            request_url: request_url.into(),
            content: None,
            request_options: None,
            response: None,
            exception: None,
            duration: None,
            created_at: Utc::now(),
            created_by: None,
            created_from_ip: None,
            created_from_ua: None,
        }
    }

    /// Record the call duration in seconds
    pub fn set_duration(&mut self, seconds: f64) {
        self.duration = Some(round_to(seconds, 2));
    }

    /// Fill creator fields
    pub fn apply_origin(&mut self, origin: Origin) {
        self.created_by = origin.user;
        self.created_from_ip = origin.ip;
        self.created_from_ua = origin.user_agent;
    }

    /// Whether the call failed
    pub fn is_error(&self) -> bool {
        self.exception.is_some()
    }

    /// Replace raw body handles in the declared options with their type label
    pub fn scrub(&mut self) {
        let Some(options) = self.request_options.take() else {
            return;
        };
        self.request_options = Some(
            options
                .into_iter()
                .map(|(key, value)| match value {
                    OptionValue::Handle(handle) => {
                        let kind = handle.kind().to_string();
                        (key, OptionValue::from(kind))
                    }
                    json => (key, json),
                })
                .collect(),
        );
    }
}
