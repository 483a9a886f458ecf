//! The API client trait

use super::runtime::ClientRuntime;
use super::types::{join_url, HealthStatus};
use crate::error::{Error, Result};
use crate::logging::{describe_error, LogResult};
use crate::request::ApiRequest;
use crate::transport::Response;
use crate::types::Options;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::error;

/// A client for one external API.
///
/// Implementors supply the base URL and response formatting; the provided
/// methods drive requests through the runtime's decorator chain, executor
/// and request logger.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// The formatted result of a request.
    ///
    /// The request log renders it through [`LogResult`]. A [`Response`]
    /// output is only logged with its body when it is buffered; a live body
    /// is recorded as [`crate::logging::UNCONVERTIBLE`]. Buffer it in
    /// `format_response` (see [`super::ResponseClient`]) to log the body.
    type Output: LogResult + Send;

    /// Collaborators used to send requests
    fn runtime(&self) -> &ClientRuntime;

    /// Base URL joined with relative request paths. Empty when the client
    /// only sends absolute URLs.
    fn base_url(&self) -> String {
        String::new()
    }

    /// Name used in logs
    fn label(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Method used when the request does not declare one
    fn default_method(&self, _request: &dyn ApiRequest) -> String {
        "GET".to_string()
    }

    /// Full URL for `request`
    fn request_url(&self, request: &dyn ApiRequest) -> Result<String> {
        join_url(&self.base_url(), &request.request_path()).ok_or_else(|| Error::MissingBaseUrl {
            client: self.label().to_string(),
        })
    }

    /// Transport options for `request`, before cache, lock and timeout
    /// options are added
    fn request_options(&self, request: &dyn ApiRequest) -> Result<Option<Options>> {
        request.request_options()
    }

    /// Turn the raw response into the caller's result
    async fn format_response(
        &self,
        request: &dyn ApiRequest,
        response: Response,
    ) -> Result<Self::Output>;

    /// Send a request, propagating errors
    async fn request(&self, request: &dyn ApiRequest) -> Result<Self::Output> {
        self.runtime().execute(self, request).await
    }

    /// Send a request, logging and swallowing any error
    async fn silent_request(&self, request: &dyn ApiRequest) -> Option<Self::Output> {
        match self.request(request).await {
            Ok(output) => Some(output),
            Err(e) => {
                error!(
                    client = self.label(),
                    request = %request.log_data(),
                    error = %describe_error(&e),
                    "Silent request failed"
                );
                None
            }
        }
    }

    /// Send a request in the background. Failures are logged, never
    /// surfaced; the handle only reports completion.
    fn async_request(self: Arc<Self>, request: Arc<dyn ApiRequest>) -> JoinHandle<()>
    where
        Self: Sized + 'static,
    {
        tokio::spawn(async move {
            if let Err(e) = self.request(request.as_ref()).await {
                error!(
                    client = self.label(),
                    request = %request.log_data(),
                    error = %describe_error(&e),
                    "Async request failed"
                );
            }
        })
    }

    /// Check that the API host resolves
    async fn check(&self) -> HealthStatus {
        self.runtime().check(&self.base_url()).await
    }
}
