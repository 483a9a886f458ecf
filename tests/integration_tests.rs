//! Integration tests using mock HTTP server
//!
//! Tests the full end-to-end flow: API client → decorator chain → reqwest → request log

use pretty_assertions::assert_eq;
use serde_json::json;
use solidafy_http::client::{ApiClient, ClientRuntime, TextClient};
use solidafy_http::config::{ClientConfig, RetryConfig};
use solidafy_http::events::{BroadcastDispatcher, HttpEvent};
use solidafy_http::logging::{ChannelLogSink, JsonLinesWriter, MemoryLogSink, Origin};
use solidafy_http::request::HttpClientRequest;
use solidafy_http::types::{keys, Options};
use solidafy_http::Error;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry_config() -> ClientConfig {
    ClientConfig {
        retry: RetryConfig {
            initial_backoff_ms: 5,
            max_backoff_ms: 20,
            ..RetryConfig::default()
        },
        ..ClientConfig::default()
    }
}

fn client_with_sink(server: &MockServer, config: ClientConfig) -> (TextClient, MemoryLogSink) {
    let sink = MemoryLogSink::new();
    let runtime = ClientRuntime::builder(config)
        .log_sink(Arc::new(sink.clone()))
        .build()
        .unwrap();
    (TextClient::new(runtime, server.uri()), sink)
}

// ============================================================================
// Request Flow Tests
// ============================================================================

#[tokio::test]
async fn test_get_with_options_and_log_record() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(header("Authorization", "Bearer test-token"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"users": [{"id": 1}]})))
        .mount(&mock_server)
        .await;

    let (client, sink) = client_with_sink(&mock_server, ClientConfig::default());
    let request = HttpClientRequest::new("/api/users").with_options(
        Options::new()
            .with(keys::HEADERS, json!({"Authorization": "Bearer test-token"}))
            .with(keys::QUERY, json!({"page": 1})),
    );

    let body = client.request(&request).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["users"][0]["id"], 1);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.method, "GET");
    assert_eq!(record.request_url, format!("{}/api/users", mock_server.uri()));
    assert_eq!(record.response.as_deref(), Some(body.as_str()));
    assert!(record.exception.is_none());
    assert!(record.duration.unwrap() >= 0.0);

    let content: serde_json::Value =
        serde_json::from_str(record.content.as_deref().unwrap()).unwrap();
    assert_eq!(content["timeout"], 10);
    assert_eq!(content["query"]["page"], 1);
}

#[tokio::test]
async fn test_error_status_is_surfaced_and_logged() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/orders"))
        .respond_with(ResponseTemplate::new(422).set_body_string("invalid sku"))
        .mount(&mock_server)
        .await;

    let (client, sink) = client_with_sink(&mock_server, ClientConfig::default());
    let request = HttpClientRequest::new("/api/orders")
        .with_method("POST")
        .with_options(Options::new().with(keys::JSON, json!({"sku": "?"})));

    let err = client.request(&request).await.unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 422, ref body } if body == "invalid sku"));

    let records = sink.records();
    assert_eq!(
        records[0].exception.as_deref(),
        Some("TransportError: HTTP 422: invalid sku")
    );
}

#[tokio::test]
async fn test_retry_recovers_from_transient_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, _) = client_with_sink(&mock_server, fast_retry_config());
    let body = client
        .request(&HttpClientRequest::new("/api/flaky").with_retries(3))
        .await
        .unwrap();

    assert_eq!(body, "recovered");
}

#[tokio::test]
async fn test_same_lock_key_serializes_calls() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("done")
                .set_delay(Duration::from_millis(100)),
        )
        .expect(3)
        .mount(&mock_server)
        .await;

    let (client, sink) = client_with_sink(&mock_server, ClientConfig::default());
    let client = Arc::new(client);

    let start = Instant::now();
    let calls = (0..3).map(|_| {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            client
                .request(&HttpClientRequest::new("/api/slow").with_lock("slow"))
                .await
        })
    });
    for result in futures::future::join_all(calls).await {
        assert_eq!(result.unwrap().unwrap(), "done");
    }

    assert!(start.elapsed() >= Duration::from_millis(300));
    assert_eq!(sink.len(), 3);
}

#[tokio::test]
async fn test_read_through_cache_serves_second_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/catalog"))
        .respond_with(ResponseTemplate::new(200).set_body_string("catalog v1"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = ClientConfig {
        response_cache_enabled: true,
        ..ClientConfig::default()
    };
    let (client, sink) = client_with_sink(&mock_server, config);
    let request = HttpClientRequest::new("/api/catalog").with_cache("catalog", 60);

    assert_eq!(client.request(&request).await.unwrap(), "catalog v1");
    assert_eq!(client.request(&request).await.unwrap(), "catalog v1");
    assert_eq!(sink.len(), 2);
}

#[tokio::test]
async fn test_dns_override_routes_hostname() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .mount(&mock_server)
        .await;

    let config = ClientConfig {
        dns_overrides: HashMap::from([("partner.internal".to_string(), "127.0.0.1".to_string())]),
        ..ClientConfig::default()
    };
    let runtime = ClientRuntime::new(config).unwrap();
    let base_url = format!("http://partner.internal:{}", mock_server.address().port());
    let client = TextClient::new(runtime, base_url);

    let body = client.request(&HttpClientRequest::new("/api/ping")).await.unwrap();
    assert_eq!(body, "pong");
}

// ============================================================================
// Events and Persistence Tests
// ============================================================================

#[tokio::test]
async fn test_events_bracket_each_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/items/7"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let dispatcher = BroadcastDispatcher::default();
    let mut events = dispatcher.subscribe();
    let runtime = ClientRuntime::builder(ClientConfig::default())
        .event_dispatcher(Arc::new(dispatcher))
        .build()
        .unwrap();
    let client = TextClient::new(runtime, mock_server.uri());

    client
        .request(&HttpClientRequest::new("/api/items/7").with_method("DELETE"))
        .await
        .unwrap();

    match events.recv().await.unwrap() {
        HttpEvent::Request(e) => assert_eq!(e.method, "DELETE"),
        other => panic!("expected request event, got {}", other.name()),
    }
    match events.recv().await.unwrap() {
        HttpEvent::Response(e) => {
            assert_eq!(e.status_code, 204);
            assert!(e.duration >= 0.0);
        }
        other => panic!("expected response event, got {}", other.name()),
    }
}

#[tokio::test]
async fn test_json_lines_log_file() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("green"))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("requests.jsonl");
    let (sink, writer) = ChannelLogSink::spawn(16, JsonLinesWriter::new(&log_path));

    let runtime = ClientRuntime::builder(ClientConfig::default())
        .log_sink(Arc::new(sink))
        .log_context(Arc::new(Origin {
            user: Some("ops".to_string()),
            ip: Some("10.0.0.1".to_string()),
            user_agent: None,
        }))
        .build()
        .unwrap();
    let client = TextClient::new(runtime, mock_server.uri());

    client.request(&HttpClientRequest::new("/api/status")).await.unwrap();
    client.request(&HttpClientRequest::new("/api/status")).await.unwrap();

    drop(client);
    writer.await.unwrap();

    let contents = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["response"], "green");
    assert_eq!(lines[0]["created_by"], "ops");
    assert_eq!(lines[0]["created_from_ip"], "10.0.0.1");
    assert!(lines[1]["exception"].is_null());
}

// ============================================================================
// Call Mode Tests
// ============================================================================

#[tokio::test]
async fn test_silent_and_async_requests_never_fail() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let (client, sink) = client_with_sink(&mock_server, ClientConfig::default());
    let client = Arc::new(client);

    let silent = client
        .silent_request(&HttpClientRequest::new("/api/broken"))
        .await;
    assert!(silent.is_none());

    Arc::clone(&client)
        .async_request(Arc::new(HttpClientRequest::new("/api/broken")))
        .await
        .unwrap();

    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.exception.is_some()));
}

#[tokio::test]
async fn test_health_check_for_ip_base_url() {
    let mock_server = MockServer::start().await;
    let (client, _) = client_with_sink(&mock_server, ClientConfig::default());

    assert!(client.check().await.is_success());
}
