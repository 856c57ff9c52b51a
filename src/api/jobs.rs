use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::Form;
use tracing::{debug, info, warn};

use super::error::ClientError;
use super::transport::Transport;
use super::types::{JobAccepted, JobData};
use super::ApiClient;
use crate::core::backend::JobBackend;
use crate::core::submission::{ImageJobRequest, Submission, VideoJobRequest};

impl ApiClient {
    /// Enqueue an image posting job (`/submit-job`).
    pub async fn submit_image_job(&self, request: &ImageJobRequest) -> Result<String, ClientError> {
        let mut form = Form::new();
        for image in &request.images {
            form = form.part("images", image.to_part().await?);
        }
        for (key, value) in request.form_fields() {
            form = form.text(key, value);
        }

        let http = self.transport.client().post(self.url("/submit-job")).multipart(form);
        let response = self
            .transport
            .call(http, Self::timeout(self.timeouts.submit_image_job_secs))
            .await?;

        Self::accepted(response).await
    }

    /// Enqueue a video posting job (`/submit-video-job`).
    pub async fn submit_video_job(&self, request: &VideoJobRequest) -> Result<String, ClientError> {
        let http = self
            .transport
            .client()
            .post(self.url("/submit-video-job"))
            .json(request);
        let response = self
            .transport
            .call(http, Self::timeout(self.timeouts.submit_video_job_secs))
            .await?;

        Self::accepted(response).await
    }

    async fn accepted(response: reqwest::Response) -> Result<String, ClientError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::SubmissionRejected {
                status: status.as_u16(),
                body: Transport::error_body(response).await,
            });
        }

        let accepted: JobAccepted = Transport::parse_json(response).await?;
        Ok(accepted.job_id)
    }

    /// Fetch job status, retrying transient failures with backoff.
    /// A 404 is final.
    pub async fn fetch_job_status(&self, job_id: &str) -> Result<JobData, ClientError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.job_status_once(job_id).await {
                Ok(data) => return Ok(data),
                Err(e) if e.is_transient() => match self.status_retry.delay_after(attempt) {
                    Some(delay) => {
                        warn!(
                            job_id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Job status check failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            }
        }
    }

    async fn job_status_once(&self, job_id: &str) -> Result<JobData, ClientError> {
        let http = self
            .transport
            .client()
            .get(self.url(&format!("/job/{}", job_id)));
        let response = self
            .transport
            .call(http, Self::timeout(self.timeouts.job_status_secs))
            .await?;

        match response.status() {
            status if status.is_success() => Transport::parse_json(response).await,
            StatusCode::NOT_FOUND => Err(ClientError::JobNotFound(job_id.to_string())),
            status => Err(ClientError::Http {
                status: status.as_u16(),
                body: Transport::error_body(response).await,
            }),
        }
    }
}

#[async_trait]
impl JobBackend for ApiClient {
    async fn submit(&self, submission: &Submission) -> Result<String, ClientError> {
        submission.warn_on_long_captions();

        let job_id = match submission {
            Submission::Images(request) => {
                debug!(images = request.images.len(), kind = request.kind().as_str(), "Submitting image job");
                self.submit_image_job(request).await?
            }
            Submission::Video(request) => {
                debug!(videos = request.videos.len(), multi_post = request.multi_post, "Submitting video job");
                self.submit_video_job(request).await?
            }
        };

        info!(%job_id, kind = submission.kind().as_str(), "Job accepted");
        Ok(job_id)
    }

    async fn job_status(&self, job_id: &str) -> Result<JobData, ClientError> {
        self.fetch_job_status(job_id).await
    }
}
