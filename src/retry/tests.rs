use super::*;
use crate::config::RetryConfig;
use crate::error::Error;
use crate::test_support::{ScriptedTransport, Step};
use crate::transport::Transport;
use crate::types::{keys, BackoffType, OptionValue, Options, RawHandle};
use std::time::Duration;
use test_case::test_case;

fn fast_config() -> RetryConfig {
    RetryConfig {
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        ..RetryConfig::default()
    }
}

fn retrying(transport: &ScriptedTransport, max_retries: u32) -> RetryTransport {
    RetryTransport::new(transport.shared(), max_retries, fast_config())
}

#[test_case(BackoffType::Constant, 3, 100; "constant")]
#[test_case(BackoffType::Linear, 2, 300; "linear")]
#[test_case(BackoffType::Exponential, 3, 800; "exponential")]
#[test_case(BackoffType::Exponential, 10, 1000; "exponential capped")]
fn test_calculate_backoff(backoff_type: BackoffType, attempt: u32, expected_ms: u64) {
    let config = RetryConfig {
        backoff_type,
        initial_backoff_ms: 100,
        max_backoff_ms: 1000,
        ..RetryConfig::default()
    };
    let transport = RetryTransport::new(ScriptedTransport::ok().shared(), 3, config);

    assert_eq!(transport.calculate_backoff(attempt), Duration::from_millis(expected_ms));
}

#[tokio::test]
async fn test_success_is_not_retried() {
    let transport = ScriptedTransport::ok();

    let response = retrying(&transport, 3)
        .request("GET", "http://api.test/items", Options::new())
        .await
        .unwrap();

    assert_eq!(response.status_code(), 200);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_retryable_status_then_success() {
    let transport = ScriptedTransport::new([Step::Respond(503, ""), Step::Respond(429, "")]);

    let response = retrying(&transport, 3)
        .request("GET", "http://api.test/items", Options::new())
        .await
        .unwrap();

    assert_eq!(response.status_code(), 200);
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_return_last_response() {
    let transport = ScriptedTransport::new([
        Step::Respond(502, "a"),
        Step::Respond(502, "b"),
        Step::Respond(502, "c"),
    ]);

    let response = retrying(&transport, 2)
        .request("GET", "http://api.test/items", Options::new())
        .await
        .unwrap();

    assert_eq!(response.status_code(), 502);
    assert_eq!(response.text().await.unwrap(), "c");
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let transport = ScriptedTransport::new([Step::Respond(404, "missing")]);

    let response = retrying(&transport, 3)
        .request("GET", "http://api.test/items", Options::new())
        .await
        .unwrap();

    assert_eq!(response.status_code(), 404);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_timeout_is_retried() {
    let transport = ScriptedTransport::new([Step::Timeout]);

    let response = retrying(&transport, 1)
        .request("GET", "http://api.test/items", Options::new())
        .await
        .unwrap();

    assert_eq!(response.status_code(), 200);
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_timeout_exhaustion_returns_error() {
    let transport = ScriptedTransport::new([Step::Timeout, Step::Timeout]);

    let err = retrying(&transport, 1)
        .request("GET", "http://api.test/items", Options::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout { .. }));
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_non_retryable_error_returned_immediately() {
    let transport = ScriptedTransport::new([Step::Fail("bad certificate")]);

    let err = retrying(&transport, 3)
        .request("GET", "http://api.test/items", Options::new())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "bad certificate");
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_retry_after_is_capped_by_max_backoff() {
    let transport = ScriptedTransport::new([Step::RetryAfter(503, "120")]);
    let started = std::time::Instant::now();

    let response = retrying(&transport, 1)
        .request("GET", "http://api.test/items", Options::new())
        .await
        .unwrap();

    assert_eq!(response.status_code(), 200);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_every_attempt_gets_the_same_options() {
    let transport = ScriptedTransport::new([Step::Respond(500, "")]);
    let options = Options::new().with(keys::TIMEOUT, 4u64);

    retrying(&transport, 1)
        .request("GET", "http://api.test/items", options.clone())
        .await
        .unwrap();

    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].options, options);
    assert_eq!(calls[1].options, options);
}

#[tokio::test]
async fn test_handle_body_shared_across_attempts() {
    let transport = ScriptedTransport::new([Step::Respond(500, "")]);
    let handle = RawHandle::from_bytes("stream", "payload");
    let options = Options::new().with(keys::BODY, handle.clone());

    retrying(&transport, 1)
        .request("POST", "http://api.test/upload", options)
        .await
        .unwrap();

    let calls = transport.calls();
    assert_eq!(calls[1].options.get(keys::BODY), Some(&OptionValue::Handle(handle)));
}
