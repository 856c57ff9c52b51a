//! HTTP transport for backend and upload-host calls.
//!
//! Adds a hard deadline to every request and decodes bodies defensively.
//! Retries are deliberately absent here: callers pick their own policy.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::{ClientError, snippet};

/// Shared HTTP transport. Cheap to clone.
#[derive(Clone)]
pub struct Transport {
    client: Client,
}

impl Transport {
    pub fn new() -> Result<Self, ClientError> {
        let client = Client::builder()
            .user_agent(concat!("postflow/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Start building a request on the underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Send a request, aborting it if no response arrives within `timeout`.
    ///
    /// Non-2xx responses are returned as-is; only the abort and connection
    /// failures are errors.
    pub async fn call(
        &self,
        request: RequestBuilder,
        timeout: Duration,
    ) -> Result<Response, ClientError> {
        let request = request.build()?;
        let url = request.url().to_string();
        let method = request.method().clone();

        debug!(%method, %url, timeout_secs = timeout.as_secs(), "Sending request");

        match tokio::time::timeout(timeout, self.client.execute(request)).await {
            Ok(Ok(response)) => {
                debug!(%url, status = response.status().as_u16(), "Response received");
                Ok(response)
            }
            Ok(Err(e)) if e.is_timeout() => Err(ClientError::Timeout {
                url,
                after: timeout,
            }),
            Ok(Err(e)) => Err(ClientError::from(e)),
            Err(_elapsed) => Err(ClientError::Timeout {
                url,
                after: timeout,
            }),
        }
    }

    /// Read the whole body as text, then decode it as JSON.
    pub async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|_| ClientError::MalformedResponse {
            snippet: snippet(&text),
        })
    }

    /// Body of a failed response, for diagnostics. Never fails.
    pub async fn error_body(response: Response) -> String {
        let status = response.status();
        match response.text().await {
            Ok(text) if !text.trim().is_empty() => snippet(text.trim()),
            _ => format!("Server error {}", status.as_u16()),
        }
    }
}
