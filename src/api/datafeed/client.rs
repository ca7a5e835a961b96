use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use tracing::warn;

use super::models::{DataPoint, FeedError};
use super::DataSource;

/// HTTP client for the ratio data feed
///
/// One request per refresh cycle, no retry, no caching. The request timeout
/// defaults to ten seconds so a stalled feed cannot wedge the sync loop.
pub struct DataFeedClient {
    http_client: HttpClient,
    endpoint: String,
    timeout: Duration,
}

impl DataFeedClient {
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a new feed client for the given endpoint URL
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            endpoint: endpoint.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Create a new client with a custom request timeout (for testing)
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http_client: HttpClient::new(),
            endpoint: endpoint.into(),
            timeout,
        }
    }

    /// Map a non-success response to a `FeedError::Status`
    ///
    /// JSON error bodies usually carry a `message` field; fall back to the raw
    /// body text when they don't.
    async fn handle_error_response(
        status: reqwest::StatusCode,
        response: reqwest::Response,
    ) -> FeedError {
        let body_text = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<serde_json::Value>(&body_text)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or(body_text);

        if status.is_server_error() {
            warn!("Feed server error {}: {}", status.as_u16(), message);
        }

        FeedError::Status(status.as_u16(), message)
    }

    /// GET the configured endpoint and decode the body as a record array.
    ///
    /// # Returns
    /// * `Ok(Vec<DataPoint>)` - The feed's records, in feed order
    /// * `Err(FeedError)` - Transport failure, non-success status, or a body
    ///   that does not match the expected record shape
    pub async fn fetch(&self) -> Result<Vec<DataPoint>, FeedError> {
        let response = self
            .http_client
            .get(&self.endpoint)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FeedError::Network(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::handle_error_response(status, response).await);
        }

        response
            .json::<Vec<DataPoint>>()
            .await
            .map_err(|e| FeedError::Parse(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl DataSource for DataFeedClient {
    async fn fetch_data(&self) -> Result<Vec<DataPoint>, FeedError> {
        self.fetch().await
    }
}
