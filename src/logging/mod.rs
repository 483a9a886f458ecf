//! Request logging module
//!
//! Durable audit records for every call made through a client, plus the
//! slow-request diagnostic log.
//!
//! # Overview
//!
//! - `RequestLogger` - builds and finalizes `RequestLog` records
//! - `LogResult` - how a caller's result is rendered into a record
//! - `LogSink` - where finished records go (`MemoryLogSink`, `ChannelLogSink`)

mod logger;
mod record;
mod render;
mod sink;

pub use logger::{
    describe_error, InFlightLog, RequestLogger, RequestTrace, Severity,
    DEFAULT_SLOW_THRESHOLD_MILLIS,
};
pub use record::{Origin, RequestLog};
pub use render::{LogRender, LogResult, UNCONVERTIBLE};
pub use sink::{
    ChannelLogSink, JsonLinesWriter, LogContext, LogSink, LogWriter, MemoryLogSink, NullLogSink,
};
