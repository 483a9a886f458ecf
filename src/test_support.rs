//! Test doubles shared by unit tests

use crate::error::{Error, Result};
use crate::lock::{Lock, LockFactory, MemoryLockFactory};
use crate::transport::{Response, Transport};
use crate::types::Options;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted outcome
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// Respond with status and body
    Respond(u16, &'static str),
    /// Respond with status and a `Retry-After` header
    RetryAfter(u16, &'static str),
    /// Fail with a timeout
    Timeout,
    /// Fail with a non-retryable error
    Fail(&'static str),
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub method: String,
    pub url: String,
    pub options: Options,
}

#[derive(Default)]
struct ScriptState {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<RecordedCall>>,
    bound: Mutex<Vec<Options>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Mutex<Duration>,
}

/// Transport replaying scripted outcomes, then answering `200 ok`
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    state: Arc<ScriptState>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        let transport = Self::default();
        *transport.state.steps.lock().unwrap() = steps.into_iter().collect();
        transport
    }

    pub fn ok() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.state.delay.lock().unwrap() = delay;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// Options passed to `with_options`
    pub fn bound_options(&self) -> Vec<Options> {
        self.state.bound.lock().unwrap().clone()
    }

    pub fn shared(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(&self, method: &str, url: &str, options: Options) -> Result<Response> {
        self.state.calls.lock().unwrap().push(RecordedCall {
            method: method.to_string(),
            url: url.to_string(),
            options,
        });

        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.state.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let step = self.state.steps.lock().unwrap().pop_front();
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);

        match step.unwrap_or(Step::Respond(200, "ok")) {
            Step::Respond(status, body) => Ok(Response::buffered(status, body).with_url(url)),
            Step::RetryAfter(status, seconds) => Ok(Response::buffered(status, "")
                .with_url(url)
                .with_header("retry-after", seconds)),
            Step::Timeout => Err(Error::Timeout { timeout_ms: 10 }),
            Step::Fail(message) => Err(Error::Other(message.to_string())),
        }
    }

    fn with_options(&self, options: Options) -> Arc<dyn Transport> {
        self.state.bound.lock().unwrap().push(options);
        Arc::new(self.clone())
    }
}

#[derive(Default)]
struct LockCounters {
    created: AtomicUsize,
    acquired: AtomicUsize,
    released: AtomicUsize,
    refuse: AtomicBool,
    fail_acquire: AtomicBool,
    fail_release: AtomicBool,
    keys: Mutex<Vec<String>>,
}

/// Lock factory over [`MemoryLockFactory`] that counts and can misbehave
#[derive(Clone, Default)]
pub(crate) struct CountingLockFactory {
    inner: MemoryLockFactory,
    counters: Arc<LockCounters>,
}

impl CountingLockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every acquire returns `Ok(false)`
    pub fn refusing() -> Self {
        let factory = Self::default();
        factory.counters.refuse.store(true, Ordering::SeqCst);
        factory
    }

    /// Every acquire returns an error
    pub fn failing_acquire() -> Self {
        let factory = Self::default();
        factory.counters.fail_acquire.store(true, Ordering::SeqCst);
        factory
    }

    /// Every release returns an error after releasing
    pub fn failing_release() -> Self {
        let factory = Self::default();
        factory.counters.fail_release.store(true, Ordering::SeqCst);
        factory
    }

    pub fn created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    pub fn acquired(&self) -> usize {
        self.counters.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        self.counters.keys.lock().unwrap().clone()
    }

    pub fn shared(&self) -> Arc<dyn LockFactory> {
        Arc::new(self.clone())
    }
}

impl LockFactory for CountingLockFactory {
    fn create_lock(&self, key: &str) -> Box<dyn Lock> {
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        self.counters.keys.lock().unwrap().push(key.to_string());
        Box::new(CountingLock {
            inner: self.inner.create_lock(key),
            counters: Arc::clone(&self.counters),
        })
    }
}

struct CountingLock {
    inner: Box<dyn Lock>,
    counters: Arc<LockCounters>,
}

#[async_trait]
impl Lock for CountingLock {
    fn key(&self) -> &str {
        self.inner.key()
    }

    async fn acquire(&mut self, blocking: bool) -> Result<bool> {
        if self.counters.fail_acquire.load(Ordering::SeqCst) {
            return Err(Error::lock("store unavailable"));
        }
        if self.counters.refuse.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let acquired = self.inner.acquire(blocking).await?;
        if acquired {
            self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        }
        Ok(acquired)
    }

    async fn release(&mut self) -> Result<()> {
        self.inner.release().await?;
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        if self.counters.fail_release.load(Ordering::SeqCst) {
            return Err(Error::lock("release rejected"));
        }
        Ok(())
    }
}
