use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use super::models::Job;
use super::poller::{JobPoller, PollHandle};
use super::submission::Submission;
use crate::api::types::VideoResult;
use crate::context::AppContext;
use crate::upload::MediaFile;

/// Drives a posting flow: process media, submit the job, record it and
/// track it to completion.
pub struct Orchestrator {
    ctx: AppContext,
}

impl Orchestrator {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Process videos one at a time, in order. The first failure stops the
    /// batch and names the file it happened on.
    pub async fn prepare_videos(
        &self,
        files: &[MediaFile],
        description: &str,
        special: bool,
    ) -> Result<Vec<VideoResult>> {
        let mut results = Vec::with_capacity(files.len());

        for (index, file) in files.iter().enumerate() {
            info!(
                file = file.name(),
                size = file.size(),
                position = index + 1,
                total = files.len(),
                "Processing video"
            );
            let result = self
                .ctx
                .api
                .process_video(file, description, special)
                .await
                .with_context(|| format!("Video {} ({}) failed", index + 1, file.name()))?;
            results.push(result);
        }

        Ok(results)
    }

    /// Submit a job and record it locally. Nothing is recorded when the
    /// submission fails.
    ///
    /// Image jobs are recorded under the trimmed `description`; video jobs
    /// under their first title.
    pub async fn publish(&self, submission: &Submission, description: &str) -> Result<Job> {
        let job_id = self
            .ctx
            .backend
            .submit(submission)
            .await
            .context("Job submission failed")?;

        let description = match submission {
            Submission::Video(request) => request.description(),
            Submission::Images(_) => description.trim().to_string(),
        };

        let job = Job {
            id: job_id,
            kind: submission.kind(),
            created_at: Utc::now(),
            description,
        };

        // The backend already accepted the job, so its id must still reach
        // the caller.
        if let Err(e) = self
            .ctx
            .store
            .record_at(&job.id, &job.description, job.created_at)
            .await
        {
            warn!(job_id = %job.id, error = %e, "Failed to record job locally");
        }

        info!(job_id = %job.id, kind = job.kind.as_str(), "Job published");
        Ok(job)
    }

    pub fn poller(&self) -> JobPoller {
        JobPoller::new(
            self.ctx.backend.clone(),
            self.ctx.store.clone(),
            self.ctx.config.jobs.poll_interval(),
        )
    }

    /// Start polling `job_id` in the background.
    pub fn track(&self, job_id: &str) -> PollHandle {
        self.poller().spawn(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::api::error::ClientError;
    use crate::api::types::JobData;
    use crate::config::AppConfig;
    use crate::core::backend::JobBackend;
    use crate::core::models::{Captions, JobKind, JobStatus, Platform};
    use crate::core::poller::PollState;
    use crate::core::submission::{ImageJobRequest, VideoJobRequest, VideoMode, VideoPost};
    use crate::db;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct FakeBackend {
        accept: bool,
        submitted: Mutex<u32>,
    }

    #[async_trait]
    impl JobBackend for FakeBackend {
        async fn submit(&self, _submission: &Submission) -> Result<String, ClientError> {
            *self.submitted.lock().unwrap() += 1;
            if self.accept {
                Ok("abc".to_string())
            } else {
                Err(ClientError::SubmissionRejected {
                    status: 400,
                    body: "No images".to_string(),
                })
            }
        }

        async fn job_status(&self, _job_id: &str) -> Result<JobData, ClientError> {
            Ok(serde_json::from_str(r#"{"status":"done","platform_results":{}}"#).unwrap())
        }
    }

    async fn orchestrator(accept: bool) -> (Orchestrator, Arc<FakeBackend>) {
        let config = AppConfig::default();
        let conn = db::init_in_memory().await.unwrap();
        let api = ApiClient::new(&config).unwrap();
        let backend = Arc::new(FakeBackend {
            accept,
            submitted: Mutex::new(0),
        });
        let ctx = AppContext::with_backend(config, conn, api, backend.clone());
        (Orchestrator::new(ctx), backend)
    }

    fn image_submission() -> Submission {
        let mut captions = Captions::new();
        captions.insert(Platform::Twitter, "hi".to_string());
        Submission::Images(ImageJobRequest::standard(
            vec![MediaFile::from_bytes("a.jpg", vec![1u8; 8])],
            captions,
        ))
    }

    #[tokio::test]
    async fn test_publish_records_pending_job() {
        let (orchestrator, _backend) = orchestrator(true).await;

        let job = orchestrator
            .publish(
                &image_submission(),
                "  A very long description that keeps going past forty characters  ",
            )
            .await
            .unwrap();

        assert_eq!(job.id, "abc");
        assert_eq!(job.kind, JobKind::Standard);
        assert_eq!(
            job.description,
            "A very long description that keeps going past forty characters"
        );

        let records = orchestrator.context().store.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "abc");
        assert_eq!(records[0].status, JobStatus::Pending);
        assert_eq!(records[0].desc, job.description);
    }

    #[tokio::test]
    async fn test_rejected_submission_records_nothing() {
        let (orchestrator, backend) = orchestrator(false).await;

        let err = orchestrator
            .publish(&image_submission(), "Launch")
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("No images"));
        assert_eq!(*backend.submitted.lock().unwrap(), 1);
        assert!(orchestrator.context().store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_video_job_is_recorded_under_first_title() {
        let (orchestrator, _backend) = orchestrator(true).await;
        let post = VideoPost {
            video_url: "https://files.example/a.mp4".to_string(),
            title: "Behind the scenes".to_string(),
            platform_captions: Captions::new(),
            thumbnail_url: None,
        };
        let request = VideoJobRequest::new(vec![post], 0.0, false, VideoMode::Special);

        let job = orchestrator
            .publish(&Submission::Video(request), "shot at the studio, chiropractic")
            .await
            .unwrap();

        assert_eq!(job.kind, JobKind::Video);
        assert_eq!(job.description, "Behind the scenes");
        let record = orchestrator.context().store.get("abc").await.unwrap().unwrap();
        assert_eq!(record.desc, "Behind the scenes");
    }

    #[tokio::test]
    async fn test_track_settles_and_updates_store() {
        let (orchestrator, _backend) = orchestrator(true).await;
        let job = orchestrator.publish(&image_submission(), "Launch").await.unwrap();

        let state = orchestrator.track(&job.id).wait().await.unwrap();

        assert!(matches!(state, PollState::Finished { status: JobStatus::Done, .. }));
        let record = orchestrator.context().store.get("abc").await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Done);
    }
}
