use reqwest::StatusCode;
use reqwest::multipart::Form;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{info, warn};

use super::error::ClientError;
use super::transport::Transport;
use super::types::{ProcessResponse, RegenerateResponse, VideoResult};
use super::ApiClient;
use crate::upload::MediaFile;

impl ApiClient {
    /// Generate AI captions and overlay previews for a batch of images (`/process`).
    pub async fn process_images(
        &self,
        images: &[MediaFile],
        description: &str,
        add_text_overlay: bool,
        multi_post: bool,
        font_size: Option<u32>,
    ) -> Result<ProcessResponse, ClientError> {
        let mut form = Self::images_form(images).await?
            .text("description", description.to_string())
            .text("add_text_overlay", if add_text_overlay { "1" } else { "0" });
        if multi_post {
            form = form.text("multi_post", "1");
        }
        if let Some(size) = font_size.filter(|s| *s > 0) {
            form = form.text("font_size", size.to_string());
        }

        let http = self.transport.client().post(self.url("/process")).multipart(form);
        let response = self
            .transport
            .call(http, Self::timeout(self.timeouts.process_secs))
            .await?;
        Self::decode(response).await
    }

    /// Re-render overlays with edited text (`/regenerate`).
    pub async fn regenerate_preview(
        &self,
        images: &[MediaFile],
        overlay_texts: &[String],
        description: &str,
        font_size: Option<u32>,
    ) -> Result<RegenerateResponse, ClientError> {
        let overlay_json = serde_json::to_string(overlay_texts).unwrap_or_default();
        let mut form = Self::images_form(images).await?
            .text("overlay_texts", overlay_json)
            .text("description", description.to_string());
        if let Some(size) = font_size.filter(|s| *s > 0) {
            form = form.text("font_size", size.to_string());
        }

        let http = self.transport.client().post(self.url("/regenerate")).multipart(form);
        let response = self
            .transport
            .call(http, Self::timeout(self.timeouts.regenerate_secs))
            .await?;
        Self::decode(response).await
    }

    /// Process one video.
    ///
    /// The file is first sent straight to the backend. Only when that
    /// request fails to get through (timeout, connection failure, or a 413
    /// for the payload size) is it pushed through the upload cascade and
    /// the resulting URL submitted instead. Any other backend error is
    /// returned unchanged.
    pub async fn process_video(
        &self,
        file: &MediaFile,
        description: &str,
        special: bool,
    ) -> Result<VideoResult, ClientError> {
        self.cascade.check_size(file)?;

        match self.process_video_direct(file, description, special).await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_delivery_failure() => {
                warn!(file = file.name(), error = %e, "Direct video upload failed, trying upload cascade");
            }
            Err(ClientError::Http { status, .. }) if status == StatusCode::PAYLOAD_TOO_LARGE.as_u16() => {
                warn!(file = file.name(), "Backend rejected file size, trying upload cascade");
            }
            Err(e) => return Err(e),
        }

        let video_url = self.cascade.upload(file).await?;
        info!(file = file.name(), %video_url, "Video staged, submitting URL for processing");
        self.process_video_url(&video_url, description, special).await
    }

    async fn process_video_direct(
        &self,
        file: &MediaFile,
        description: &str,
        special: bool,
    ) -> Result<VideoResult, ClientError> {
        let mut form = Form::new().part("video", file.to_part().await?);
        if !description.is_empty() {
            form = form.text("description", description.to_string());
        }
        if special {
            form = form.text("special_video", "1");
        }

        let http = self
            .transport
            .client()
            .post(self.url("/process-video"))
            .multipart(form);
        let response = self
            .transport
            .call(http, Self::timeout(self.timeouts.process_video_secs))
            .await?;
        Self::decode(response).await
    }

    /// Process a video the backend can fetch from `video_url`.
    pub async fn process_video_url(
        &self,
        video_url: &str,
        description: &str,
        special: bool,
    ) -> Result<VideoResult, ClientError> {
        let body = json!({
            "video_url": video_url,
            "description": description,
            "special_video": special,
        });

        let http = self
            .transport
            .client()
            .post(self.url("/process-video"))
            .json(&body);
        let response = self
            .transport
            .call(http, Self::timeout(self.timeouts.process_video_secs))
            .await?;
        Self::decode(response).await
    }

    async fn images_form(images: &[MediaFile]) -> Result<Form, ClientError> {
        let mut form = Form::new();
        for image in images {
            form = form.part("images", image.to_part().await?);
        }
        Ok(form)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Transport::parse_json(response).await;
        }

        Err(ClientError::Http {
            status: status.as_u16(),
            body: Transport::error_body(response).await,
        })
    }
}
