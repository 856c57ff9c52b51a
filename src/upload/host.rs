use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::multipart::Form;

use super::{MediaFile, UploadTarget};
use crate::api::error::{ClientError, snippet};
use crate::api::transport::Transport;
use crate::config::UploadConfig;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^https?://\S+$").unwrap());

/// A public multipart-upload host that answers with the file URL as plain text.
pub struct DirectHost {
    name: &'static str,
    endpoint: String,
    limit: u64,
    fields: Vec<(&'static str, String)>,
    transport: Transport,
    timeout: Duration,
}

impl DirectHost {
    /// Temporary host with the largest allowance.
    pub fn litterbox(transport: Transport, config: &UploadConfig, timeout: Duration) -> Self {
        Self {
            name: "litterbox",
            endpoint: config.litterbox_url.clone(),
            limit: config.litterbox_limit_bytes,
            fields: vec![
                ("reqtype", "fileupload".to_string()),
                ("time", config.litterbox_retention.clone()),
            ],
            transport,
            timeout,
        }
    }

    /// Permanent host with a smaller allowance.
    pub fn catbox(transport: Transport, config: &UploadConfig, timeout: Duration) -> Self {
        Self {
            name: "catbox",
            endpoint: config.catbox_url.clone(),
            limit: config.catbox_limit_bytes,
            fields: vec![("reqtype", "fileupload".to_string())],
            transport,
            timeout,
        }
    }
}

#[async_trait]
impl UploadTarget for DirectHost {
    fn name(&self) -> &str {
        self.name
    }

    fn size_limit(&self) -> u64 {
        self.limit
    }

    async fn attempt(&self, file: &MediaFile) -> Result<String, ClientError> {
        let mut form = Form::new();
        for (key, value) in &self.fields {
            form = form.text(*key, value.clone());
        }
        form = form.part("fileToUpload", file.to_part().await?);

        let request = self.transport.client().post(&self.endpoint).multipart(form);
        let response = self.transport.call(request, self.timeout).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                body: Transport::error_body(response).await,
            });
        }

        let body = response.text().await?;
        parse_url_body(&body)
    }
}

/// Hosts reply with the bare URL; anything else is a failed upload.
fn parse_url_body(body: &str) -> Result<String, ClientError> {
    let url = body.trim();
    if URL_RE.is_match(url) {
        Ok(url.to_string())
    } else {
        Err(ClientError::MalformedResponse {
            snippet: snippet(url),
        })
    }
}
