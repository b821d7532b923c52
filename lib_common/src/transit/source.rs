//! HTTP feed source: fetches the protobuf payload with the API key passed as
//! the `key` query parameter.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::error::FetchError;
use crate::core::feed::FeedSource;
use crate::retrieve::ky_http::{ApiClient, ClientOptions, RetrieveError};

/// A `FeedSource` backed by a retrying HTTP client.
pub struct HttpFeedSource {
    client: ApiClient,
    api_key: String,
    timeout: Duration,
}

impl HttpFeedSource {
    /// Creates a source for the feed at `feed_url`.
    ///
    /// `options.timeout` bounds each attempt; the poller applies its own overall
    /// deadline on top of the retries.
    pub fn new(feed_url: &str, api_key: impl Into<String>, options: &ClientOptions) -> Result<Self, RetrieveError> {
        Ok(Self {
            client: ApiClient::new(feed_url, options)?,
            api_key: api_key.into(),
            timeout: options.timeout,
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self) -> Result<Bytes, FetchError> {
        let response = self
            .client
            .get_bytes("", &[("key", self.api_key.as_str())])
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(self.timeout)
                } else {
                    FetchError::Network(e.to_string())
                }
            })?;

        match response.status {
            _ if response.success => Ok(response.body),
            401 | 403 => Err(FetchError::Unauthorized(response.status)),
            status => Err(FetchError::Status(status)),
        }
    }
}
