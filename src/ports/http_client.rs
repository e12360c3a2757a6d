use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body as AxumBody;
use hyper::{Request, Response};
use thiserror::Error;

/// Custom error type for HTTP client operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpClientError {
    /// Error when connection to a downstream service fails
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error when request times out
    #[error("Timeout error after {0:?}")]
    Timeout(Duration),

    /// Error when request is invalid
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for HTTP client operations
pub type HttpClientResult<T> = Result<T, HttpClientError>;

/// HttpClient defines the port (interface) for making HTTP requests to
/// downstream services.
#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    /// Send an HTTP request to a downstream service.
    ///
    /// The timeout bounds the whole exchange; expiry maps to
    /// [`HttpClientError::Timeout`]. There is no other cancellation
    /// mechanism; closing the inbound connection does not abort an
    /// in-flight downstream call.
    async fn send_request(
        &self,
        req: Request<AxumBody>,
        timeout: Duration,
    ) -> HttpClientResult<Response<AxumBody>>;

    /// Perform a liveness probe against `url`.
    ///
    /// Returns `Ok(true)` for a 2xx response, `Ok(false)` for any other
    /// response or connection error, and `Err(Timeout)` when the probe
    /// does not complete in time.
    async fn health_check(&self, url: &str, timeout: Duration) -> HttpClientResult<bool>;
}
