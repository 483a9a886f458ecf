//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::client::{ApiClient, ClientRuntime, TextClient};
use crate::config::ClientConfig;
use crate::error::{Error, Result, ResultExt};
use crate::events::{BroadcastDispatcher, HttpEvent};
use crate::logging::{ChannelLogSink, JsonLinesWriter};
use crate::request::HttpClientRequest;
use crate::types::{keys, JsonObject, JsonValue, Options};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Queue size for the background log writer
const LOG_QUEUE_CAPACITY: usize = 64;

/// Arguments of the `request` command
#[derive(Debug)]
struct RequestArgs<'a> {
    target: &'a str,
    method: &'a str,
    base_url: Option<&'a str>,
    headers: &'a [String],
    query: &'a [String],
    json: Option<&'a str>,
    lock_key: Option<&'a str>,
    cache_key: Option<&'a str>,
    cache_ttl: u64,
    retries: u32,
    log_file: Option<&'a Path>,
}

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Request {
                target,
                method,
                base_url,
                headers,
                query,
                json,
                lock_key,
                cache_key,
                cache_ttl,
                retries,
                log_file,
            } => {
                self.request(RequestArgs {
                    target,
                    method,
                    base_url: base_url.as_deref(),
                    headers,
                    query,
                    json: json.as_deref(),
                    lock_key: lock_key.as_deref(),
                    cache_key: cache_key.as_deref(),
                    cache_ttl: *cache_ttl,
                    retries: *retries,
                    log_file: log_file.as_deref(),
                })
                .await
            }
            Commands::Check { base_url } => self.check(base_url).await,
            Commands::Resolve { host } => self.resolve(host).await,
            Commands::Config => self.show_config(),
        }
    }

    /// Load config from the file (if any), then apply the environment
    fn load_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.cli.config {
            Some(path) => ClientConfig::from_file(path)
                .with_context(|| format!("loading config file {}", path.display()))?,
            None => ClientConfig::default(),
        };
        config.apply_env(std::env::vars());
        config.validate()?;
        Ok(config)
    }

    async fn request(&self, args: RequestArgs<'_>) -> Result<()> {
        let config = self.load_config()?;
        let request = build_request(&args)?;

        let dispatcher = BroadcastDispatcher::default();
        let mut events = dispatcher.subscribe();
        let mut builder = ClientRuntime::builder(config).event_dispatcher(Arc::new(dispatcher));

        let mut writer = None;
        if let Some(path) = args.log_file {
            let (sink, handle) =
                ChannelLogSink::spawn(LOG_QUEUE_CAPACITY, JsonLinesWriter::new(path));
            builder = builder.log_sink(Arc::new(sink));
            writer = Some(handle);
        }

        let client = TextClient::new(builder.build()?, args.base_url.unwrap_or_default());
        let result = client.request(&request).await;

        if self.cli.verbose {
            self.drain_events(&mut events);
        }

        // Dropping the client closes the log queue so the writer can finish
        drop(client);
        if let Some(handle) = writer {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Request log writer did not finish cleanly");
            }
        }

        let body = result?;
        let body = serde_json::from_str::<JsonValue>(&body).unwrap_or(JsonValue::String(body));
        self.output_message(&json!({
            "type": "RESPONSE",
            "body": body,
        }));
        Ok(())
    }

    async fn check(&self, base_url: &str) -> Result<()> {
        let runtime = ClientRuntime::new(self.load_config()?)?;
        let status = runtime.check(base_url).await;

        self.output_message(&json!({
            "type": "CONNECTION_STATUS",
            "connectionStatus": status,
        }));

        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Other(status.message().to_string()))
        }
    }

    async fn resolve(&self, host: &str) -> Result<()> {
        let runtime = ClientRuntime::new(self.load_config()?)?;
        let ip = runtime.dns().resolve(host).await;

        self.output_message(&json!({
            "type": "RESOLVE",
            "host": host,
            "ip": ip,
            "resolved": ip != host,
        }));
        Ok(())
    }

    fn show_config(&self) -> Result<()> {
        let config = self.load_config()?;
        self.output_message(&json!({
            "type": "CONFIG",
            "config": serde_json::to_value(&config)?,
        }));
        Ok(())
    }

    fn drain_events(&self, events: &mut broadcast::Receiver<HttpEvent>) {
        while let Ok(event) = events.try_recv() {
            let message = match &event {
                HttpEvent::Request(e) => json!({
                    "type": "EVENT",
                    "event": event.name(),
                    "method": e.method,
                    "url": e.url,
                }),
                HttpEvent::Response(e) => json!({
                    "type": "EVENT",
                    "event": event.name(),
                    "method": e.method,
                    "url": e.url,
                    "status_code": e.status_code,
                    "duration": e.duration,
                }),
            };
            self.output_message(&message);
        }
    }

    fn output_message(&self, msg: &JsonValue) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

/// Build the logical request from command arguments
fn build_request(args: &RequestArgs<'_>) -> Result<HttpClientRequest> {
    let mut options = Options::new();

    if !args.headers.is_empty() {
        let mut headers = JsonObject::new();
        for raw in args.headers {
            let (name, value) = split_pair(raw, ':')?;
            headers.insert(name, JsonValue::String(value));
        }
        options.insert(keys::HEADERS, JsonValue::Object(headers));
    }

    if !args.query.is_empty() {
        let mut query = JsonObject::new();
        for raw in args.query {
            let (name, value) = split_pair(raw, '=')?;
            query.insert(name, JsonValue::String(value));
        }
        options.insert(keys::QUERY, JsonValue::Object(query));
    }

    if let Some(body) = args.json {
        options.insert(keys::JSON, serde_json::from_str::<JsonValue>(body)?);
    }

    let mut request = HttpClientRequest::new(args.target)
        .with_method(args.method)
        .with_options(options);
    if args.retries > 0 {
        request = request.with_retries(args.retries);
    }
    if let Some(key) = args.cache_key {
        request = request.with_cache(key, args.cache_ttl);
    }
    if let Some(key) = args.lock_key {
        request = request.with_lock(key);
    }
    Ok(request)
}

/// Split "name<sep>value", trimming both sides
fn split_pair(raw: &str, separator: char) -> Result<(String, String)> {
    match raw.split_once(separator) {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(Error::config(format!(
            "expected 'name{separator}value', got '{raw}'"
        ))),
    }
}
