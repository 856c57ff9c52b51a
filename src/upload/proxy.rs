use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::Form;

use super::{MediaFile, UploadTarget};
use crate::api::error::ClientError;
use crate::api::transport::Transport;
use crate::api::types::ProxyUpload as ProxyResponse;

/// Backend-mediated upload. Avoids third-party hosts talking to the client
/// directly, at the cost of routing the whole payload through the backend.
pub struct ProxyUpload {
    url: String,
    limit: u64,
    transport: Transport,
    timeout: Duration,
}

impl ProxyUpload {
    pub fn new(transport: Transport, api_base_url: &str, limit: u64, timeout: Duration) -> Self {
        Self {
            url: format!("{}/upload-proxy", api_base_url.trim_end_matches('/')),
            limit,
            transport,
            timeout,
        }
    }
}

#[async_trait]
impl UploadTarget for ProxyUpload {
    fn name(&self) -> &str {
        "proxy"
    }

    fn size_limit(&self) -> u64 {
        self.limit
    }

    async fn attempt(&self, file: &MediaFile) -> Result<String, ClientError> {
        let form = Form::new().part("file", file.to_part().await?);
        let request = self.transport.client().post(&self.url).multipart(form);
        let response = self.transport.call(request, self.timeout).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                body: Transport::error_body(response).await,
            });
        }

        let body: ProxyResponse = Transport::parse_json(response).await?;
        Ok(body.url)
    }
}
