//! Wire types for the backend HTTP contract.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::models::{Captions, JobStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewImage {
    pub name: String,
    pub url: String,
}

/// Response of `/process`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessResponse {
    #[serde(default)]
    pub num_images: usize,
    #[serde(default)]
    pub add_text_overlay: bool,
    #[serde(default)]
    pub overlay_texts: Vec<String>,
    #[serde(default)]
    pub preview_images: Vec<PreviewImage>,
    #[serde(default)]
    pub multi_post: bool,
    #[serde(default)]
    pub font_size_used: u32,
    #[serde(default)]
    pub platform_captions: Option<Captions>,
    #[serde(default)]
    pub per_image_captions: Option<Vec<Captions>>,
}

/// Response of `/regenerate`.
#[derive(Debug, Clone, Deserialize)]
pub struct RegenerateResponse {
    #[serde(default)]
    pub overlay_texts: Vec<String>,
    #[serde(default)]
    pub preview_images: Vec<PreviewImage>,
    #[serde(default)]
    pub font_size_used: u32,
}

/// Response of `/process-video`.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoResult {
    pub video_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub platform_captions: Captions,
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Response of `/submit-job` and `/submit-video-job`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobAccepted {
    pub job_id: String,
}

/// Response of `/upload-proxy`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyUpload {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub type PlatformResults = BTreeMap<String, PlatformResult>;

/// Raw body of `GET /job/{id}`.
///
/// Use [`JobData::status`] and [`JobData::outcome`] rather than reading the
/// optional fields directly; the backend signals the result shape by which
/// fields are present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobData {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub multi_post: Option<bool>,
    #[serde(default)]
    pub platform_results: Option<PlatformResults>,
    #[serde(default)]
    pub results: Option<Vec<RawItemResult>>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawItemResult {
    #[serde(default)]
    pub kind: Option<ItemKind>,
    #[serde(default)]
    pub image_index: Option<usize>,
    #[serde(default)]
    pub video_index: Option<usize>,
    #[serde(default)]
    pub scheduled_time: Option<String>,
    #[serde(default)]
    pub platform_results: PlatformResults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Image,
    Video,
}

/// One posted item of a multi-post job.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResult {
    pub kind: ItemKind,
    pub index: usize,
    pub scheduled_time: Option<String>,
    pub platform_results: PlatformResults,
}

impl ItemResult {
    /// e.g. `Video 2 (Scheduled)`, numbered from 1.
    pub fn label(&self) -> String {
        let kind = match self.kind {
            ItemKind::Image => "Image",
            ItemKind::Video => "Video",
        };
        let when = if self.scheduled_time.is_some() {
            "Scheduled"
        } else {
            "Immediate"
        };
        format!("{} {} ({})", kind, self.index + 1, when)
    }
}

/// Decoded result of a finished job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// One post, results keyed by platform
    Platforms(PlatformResults),
    /// One entry per posted item
    Items(Vec<ItemResult>),
    /// Job-level error message
    Error(String),
    Empty,
}

impl JobData {
    /// Parsed status; a missing status means the job is still queued,
    /// an unrecognised one yields `None`.
    pub fn status(&self) -> Option<JobStatus> {
        match self.status.as_deref() {
            None | Some("") => Some(JobStatus::Pending),
            Some(s) => s.parse().ok(),
        }
    }

    /// Decode the result payload into a tagged outcome.
    ///
    /// An item carrying an explicit `kind` wins; otherwise the presence of
    /// `video_index` marks a video and anything else is an image.
    pub fn outcome(&self) -> JobOutcome {
        if let (Some(true), Some(results)) = (self.multi_post, &self.results) {
            let items = results
                .iter()
                .enumerate()
                .map(|(position, raw)| {
                    let kind = raw.kind.unwrap_or(if raw.video_index.is_some() {
                        ItemKind::Video
                    } else {
                        ItemKind::Image
                    });
                    let index = match kind {
                        ItemKind::Video => raw.video_index,
                        ItemKind::Image => raw.image_index,
                    }
                    .unwrap_or(position);

                    ItemResult {
                        kind,
                        index,
                        scheduled_time: raw.scheduled_time.clone(),
                        platform_results: raw.platform_results.clone(),
                    }
                })
                .collect();
            return JobOutcome::Items(items);
        }

        if let Some(results) = &self.platform_results {
            return JobOutcome::Platforms(results.clone());
        }

        match &self.error {
            Some(error) => JobOutcome::Error(error.clone()),
            None => JobOutcome::Empty,
        }
    }
}
