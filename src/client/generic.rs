//! Ready-made clients returning body text or the buffered response

use super::api::ApiClient;
use super::runtime::ClientRuntime;
use crate::error::{Error, Result};
use crate::request::ApiRequest;
use crate::transport::Response;
use async_trait::async_trait;

/// Client for APIs that need no response decoding.
///
/// Returns the body text of 2xx/3xx responses; other statuses become
/// [`Error::HttpStatus`] carrying the body.
#[derive(Debug, Clone)]
pub struct TextClient {
    runtime: ClientRuntime,
    base_url: String,
}

impl TextClient {
    pub fn new(runtime: ClientRuntime, base_url: impl Into<String>) -> Self {
        Self {
            runtime,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ApiClient for TextClient {
    type Output = String;

    fn runtime(&self) -> &ClientRuntime {
        &self.runtime
    }

    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    fn label(&self) -> &str {
        "TextClient"
    }

    async fn format_response(
        &self,
        _request: &dyn ApiRequest,
        response: Response,
    ) -> Result<String> {
        let status = response.status_code();
        let body = response.text().await?;
        if (400..600).contains(&status) {
            return Err(Error::http_status(status, body));
        }
        Ok(body)
    }
}

/// Client handing back the response itself.
///
/// The body is buffered before it is returned so the request log records
/// it and the caller can still read it. Error statuses are not raised.
#[derive(Debug, Clone)]
pub struct ResponseClient {
    runtime: ClientRuntime,
    base_url: String,
}

impl ResponseClient {
    pub fn new(runtime: ClientRuntime, base_url: impl Into<String>) -> Self {
        Self {
            runtime,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ApiClient for ResponseClient {
    type Output = Response;

    fn runtime(&self) -> &ClientRuntime {
        &self.runtime
    }

    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    fn label(&self) -> &str {
        "ResponseClient"
    }

    async fn format_response(
        &self,
        _request: &dyn ApiRequest,
        response: Response,
    ) -> Result<Response> {
        response.buffer().await
    }
}
