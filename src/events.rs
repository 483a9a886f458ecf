//! Request lifecycle events
//!
//! The executor emits one event before a call and one after it completes.
//! Dispatch is fire-and-forget: nothing the dispatcher does can fail a call.

use crate::types::Options;
use tokio::sync::broadcast;
use tracing::trace;

/// Emitted before the transport is invoked
#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub method: String,
    pub url: String,
    pub options: Options,
}

/// Emitted after the transport returned a response
#[derive(Debug, Clone)]
pub struct ResponseEvent {
    pub method: String,
    pub url: String,
    pub options: Options,
    /// Seconds, rounded to 6 decimals
    pub duration: f64,
    /// 0 when the status could not be determined
    pub status_code: u16,
}

/// An HTTP lifecycle event
#[derive(Debug, Clone)]
pub enum HttpEvent {
    Request(RequestEvent),
    Response(ResponseEvent),
}

impl HttpEvent {
    /// Event name
    pub fn name(&self) -> &'static str {
        match self {
            HttpEvent::Request(_) => "http.request",
            HttpEvent::Response(_) => "http.response",
        }
    }
}

/// Publishes lifecycle events
pub trait EventDispatcher: Send + Sync {
    /// Publish an event. Must not block on subscribers.
    fn dispatch(&self, event: HttpEvent);
}

/// Dispatcher that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDispatcher;

impl EventDispatcher for NoopDispatcher {
    fn dispatch(&self, _event: HttpEvent) {}
}

/// Dispatcher fanning events out over a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastDispatcher {
    sender: broadcast::Sender<HttpEvent>,
}

impl BroadcastDispatcher {
    /// Create a dispatcher buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events dispatched from now on
    pub fn subscribe(&self) -> broadcast::Receiver<HttpEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastDispatcher {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventDispatcher for BroadcastDispatcher {
    fn dispatch(&self, event: HttpEvent) {
        let name = event.name();
        if self.sender.send(event).is_err() {
            trace!(event = name, "No event subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_event() -> HttpEvent {
        HttpEvent::Request(RequestEvent {
            method: "GET".to_string(),
            url: "http://api.test".to_string(),
            options: Options::new(),
        })
    }

    #[tokio::test]
    async fn test_broadcast_delivers_to_subscribers() {
        let dispatcher = BroadcastDispatcher::new(4);
        let mut rx = dispatcher.subscribe();

        dispatcher.dispatch(request_event());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "http.request");
    }

    #[test]
    fn test_dispatch_without_subscribers_is_silent() {
        BroadcastDispatcher::default().dispatch(request_event());
        NoopDispatcher.dispatch(request_event());
    }
}
