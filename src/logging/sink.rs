//! Log persistence collaborators
//!
//! A `LogSink` receives finished records. Sinks are expected to hand the
//! record off quickly; `ChannelLogSink` queues records for a background
//! writer so request latency never includes disk or database time.

use super::record::{Origin, RequestLog};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Receives finished request logs
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Hand a record off for persistence
    async fn insert(&self, log: RequestLog) -> Result<()>;
}

/// Provides creator identity for new records
pub trait LogContext: Send + Sync {
    fn origin(&self) -> Origin;
}

impl LogContext for Origin {
    fn origin(&self) -> Origin {
        self.clone()
    }
}

/// Sink discarding every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogSink;

#[async_trait]
impl LogSink for NullLogSink {
    async fn insert(&self, _log: RequestLog) -> Result<()> {
        Ok(())
    }
}

/// Sink keeping records in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryLogSink {
    records: Arc<Mutex<Vec<RequestLog>>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored records
    pub fn records(&self) -> Vec<RequestLog> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LogSink for MemoryLogSink {
    async fn insert(&self, log: RequestLog) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| Error::persistence("memory log sink is poisoned"))?
            .push(log);
        Ok(())
    }
}

/// Durable destination drained by [`ChannelLogSink`]
#[async_trait]
pub trait LogWriter: Send {
    async fn write(&mut self, log: &RequestLog) -> Result<()>;
}

/// Appends one JSON object per line to a file
#[derive(Debug)]
pub struct JsonLinesWriter {
    path: PathBuf,
    file: Option<tokio::fs::File>,
}

impl JsonLinesWriter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LogWriter for JsonLinesWriter {
    async fn write(&mut self, log: &RequestLog) -> Result<()> {
        let mut line =
            serde_json::to_vec(log).map_err(|e| Error::serialization(e.to_string()))?;
        line.push(b'\n');

        if self.file.is_none() {
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            self.file = Some(file);
        }

        if let Some(file) = self.file.as_mut() {
            file.write_all(&line).await?;
            file.flush().await?;
        }
        Ok(())
    }
}

/// Write-behind sink feeding a background [`LogWriter`]
#[derive(Debug, Clone)]
pub struct ChannelLogSink {
    sender: mpsc::Sender<RequestLog>,
}

impl ChannelLogSink {
    /// Start the background writer task. The task ends once every sink
    /// clone is dropped and the queue is drained.
    pub fn spawn<W: LogWriter + 'static>(capacity: usize, mut writer: W) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<RequestLog>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(log) = receiver.recv().await {
                if let Err(e) = writer.write(&log).await {
                    error!(
                        url = %log.request_url,
                        error = %e,
                        "Failed to write request log"
                    );
                }
            }
            debug!("Request log writer stopped");
        });

        (Self { sender }, handle)
    }
}

#[async_trait]
impl LogSink for ChannelLogSink {
    async fn insert(&self, log: RequestLog) -> Result<()> {
        self.sender.try_send(log).map_err(|e| match e {
            TrySendError::Full(_) => Error::persistence("request log queue is full"),
            TrySendError::Closed(_) => Error::persistence("request log writer has stopped"),
        })
    }
}
