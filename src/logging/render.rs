//! Rendering call results into the log's response field

use crate::transport::Response;
use crate::types::{JsonValue, Options};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Marker stored when a result has no string form
pub const UNCONVERTIBLE: &str = "Unable to convert to string";

/// How a result is written into the log
#[derive(Debug)]
pub enum LogRender {
    /// Array-like data, serialized to JSON
    Structured(serde_json::Result<String>),
    /// Scalar or body text, stored as is
    Text(String),
    /// No string form
    Opaque,
}

/// A value that can be recorded as a request's result
pub trait LogResult {
    fn render(&self) -> LogRender;
}

fn structured<T: Serialize + ?Sized>(value: &T) -> LogRender {
    LogRender::Structured(serde_json::to_string(value))
}

impl LogResult for JsonValue {
    fn render(&self) -> LogRender {
        match self {
            JsonValue::Array(_) | JsonValue::Object(_) => structured(self),
            JsonValue::String(s) => LogRender::Text(s.clone()),
            JsonValue::Number(n) => LogRender::Text(n.to_string()),
            JsonValue::Bool(b) => LogRender::Text(b.to_string()),
            JsonValue::Null => LogRender::Opaque,
        }
    }
}

impl LogResult for str {
    fn render(&self) -> LogRender {
        LogRender::Text(self.to_string())
    }
}

impl LogResult for String {
    fn render(&self) -> LogRender {
        LogRender::Text(self.clone())
    }
}

macro_rules! scalar_results {
    ($($ty:ty),*) => {
        $(impl LogResult for $ty {
            fn render(&self) -> LogRender {
                LogRender::Text(self.to_string())
            }
        })*
    };
}

scalar_results!(bool, i32, i64, u16, u32, u64, usize, f64);

impl<T: Serialize> LogResult for Vec<T> {
    fn render(&self) -> LogRender {
        structured(self)
    }
}

impl<K: Serialize + Eq + Hash, V: Serialize> LogResult for HashMap<K, V> {
    fn render(&self) -> LogRender {
        structured(self)
    }
}

impl<K: Serialize + Ord, V: Serialize> LogResult for BTreeMap<K, V> {
    fn render(&self) -> LogRender {
        structured(self)
    }
}

impl LogResult for Options {
    fn render(&self) -> LogRender {
        structured(self)
    }
}

impl LogResult for Response {
    fn render(&self) -> LogRender {
        match self.buffered_body() {
            Some(body) => LogRender::Text(String::from_utf8_lossy(body).into_owned()),
            None => LogRender::Opaque,
        }
    }
}

impl<T: LogResult> LogResult for Option<T> {
    fn render(&self) -> LogRender {
        match self {
            Some(value) => value.render(),
            None => LogRender::Opaque,
        }
    }
}

impl LogResult for () {
    fn render(&self) -> LogRender {
        LogRender::Opaque
    }
}

impl<T: LogResult + ?Sized> LogResult for &T {
    fn render(&self) -> LogRender {
        (**self).render()
    }
}
