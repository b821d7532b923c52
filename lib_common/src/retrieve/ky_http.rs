//! # HTTP Retrieval Utilities
//!
//! An asynchronous client wrapper around `reqwest` with exponential backoff
//! retries for transient failures. Responses are returned as raw bytes plus the
//! transaction metadata, leaving interpretation of binary payloads to callers.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Url;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use thiserror::Error;

/// Failures building the client or executing a request.
#[derive(Debug, Error)]
pub enum RetrieveError {
    /// The base URL or a joined path is not a valid absolute URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The underlying `reqwest` client or body read failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A middleware (the retry layer) failed.
    #[error("middleware error: {0}")]
    Middleware(String),
}

impl RetrieveError {
    /// True when the failure was the per-request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RetrieveError::Http(e) if e.is_timeout())
    }
}

impl From<reqwest_middleware::Error> for RetrieveError {
    fn from(value: reqwest_middleware::Error) -> Self {
        match value {
            reqwest_middleware::Error::Reqwest(e) => RetrieveError::Http(e),
            reqwest_middleware::Error::Middleware(e) => RetrieveError::Middleware(e.to_string()),
        }
    }
}

/// A response body with its HTTP metadata.
#[derive(Debug)]
pub struct ApiResponse {
    /// The body, read in full. Empty for non-success responses.
    pub body: Bytes,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
    /// The headers returned by the server.
    pub headers: HeaderMap,
}

/// Tuning for `ApiClient`.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Retries on top of the first attempt for transient failures.
    pub max_retries: u32,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 3,
            user_agent: concat!("transit-feed/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// A retrying asynchronous HTTP client bound to a base URL.
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// The base URL to which all relative paths are joined.
    base_url: Url,
}

impl ApiClient {
    /// Creates a client with an exponential backoff retry policy.
    ///
    /// # Errors
    /// Fails if `base_url` is not an absolute URL or the TLS backend cannot be
    /// initialized.
    pub fn new(base_url: &str, options: &ClientOptions) -> Result<Self, RetrieveError> {
        let url = Url::parse(base_url)?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(options.max_retries);

        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.as_str())
            .build()?;

        let inner = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { inner, base_url: url })
    }

    /// The base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Performs a `GET` of `path` (relative to the base URL, empty for the base
    /// itself) with the given query parameters and reads the body as bytes.
    ///
    /// Non-success statuses are returned as a response with `success == false`
    /// rather than as an error.
    pub async fn get_bytes(&self, path: &str, query: &[(&str, &str)]) -> Result<ApiResponse, RetrieveError> {
        let full_url = self.base_url.join(path)?;

        let response = self.inner.get(full_url).query(query).send().await?;
        let status = response.status();
        let headers = response.headers().clone();

        if status.is_success() {
            let body = response.bytes().await?;
            Ok(ApiResponse {
                body,
                status: status.as_u16(),
                success: true,
                headers,
            })
        } else {
            Ok(ApiResponse {
                body: Bytes::new(),
                status: status.as_u16(),
                success: false,
                headers,
            })
        }
    }
}
