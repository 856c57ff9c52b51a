//! Job submission shapes.
//!
//! The caller picks the shape explicitly; nothing here guesses a job type
//! from the data it is given.

use serde::Serialize;
use tracing::warn;

use super::models::{Captions, JobKind, Platform, over_limit};
use crate::api::types::VideoResult;
use crate::upload::MediaFile;

/// Longest description stored for a job.
pub const DESCRIPTION_LEN: usize = 40;

/// A fully specified posting job, ready to submit.
pub enum Submission {
    Images(ImageJobRequest),
    Video(VideoJobRequest),
}

impl Submission {
    pub fn kind(&self) -> JobKind {
        match self {
            Submission::Images(request) => request.kind(),
            Submission::Video(_) => JobKind::Video,
        }
    }

    /// Per-item posting offsets this job will be scheduled with.
    pub fn schedule(&self) -> Vec<ScheduleSlot> {
        match self {
            Submission::Images(request) => request.schedule(),
            Submission::Video(request) => request.schedule(),
        }
    }

    /// Log captions that the target platform will truncate or reject.
    pub fn warn_on_long_captions(&self) {
        let sets: Vec<&Captions> = match self {
            Submission::Images(request) => match &request.captions {
                ImageCaptions::Shared(captions) => vec![captions],
                ImageCaptions::PerImage { captions, .. } => captions.iter().collect(),
            },
            Submission::Video(request) => request
                .videos
                .iter()
                .map(|v| &v.platform_captions)
                .collect(),
        };

        for (item, captions) in sets.into_iter().enumerate() {
            for platform in over_limit(captions) {
                warn!(
                    item,
                    %platform,
                    limit = platform.caption_limit(),
                    "Caption exceeds platform limit"
                );
            }
        }
    }
}

pub enum ImageCaptions {
    /// One caption set used for every image, posted together.
    Shared(Captions),
    /// One caption set per image, each posted `interval_hours` after the previous.
    PerImage {
        captions: Vec<Captions>,
        interval_hours: f64,
    },
}

pub struct ImageJobRequest {
    pub images: Vec<MediaFile>,
    pub captions: ImageCaptions,
    pub overlay_texts: Vec<String>,
    pub add_text_overlay: bool,
    pub font_size: Option<u32>,
}

impl ImageJobRequest {
    pub fn standard(images: Vec<MediaFile>, captions: Captions) -> Self {
        Self {
            images,
            captions: ImageCaptions::Shared(captions),
            overlay_texts: Vec::new(),
            add_text_overlay: true,
            font_size: None,
        }
    }

    pub fn multi(images: Vec<MediaFile>, captions: Vec<Captions>, interval_hours: f64) -> Self {
        Self {
            images,
            captions: ImageCaptions::PerImage {
                captions,
                interval_hours,
            },
            overlay_texts: Vec::new(),
            add_text_overlay: true,
            font_size: None,
        }
    }

    pub fn with_overlay(mut self, overlay_texts: Vec<String>, enabled: bool) -> Self {
        self.overlay_texts = overlay_texts;
        self.add_text_overlay = enabled;
        self
    }

    pub fn with_font_size(mut self, font_size: Option<u32>) -> Self {
        self.font_size = font_size.filter(|size| *size > 0);
        self
    }

    pub fn kind(&self) -> JobKind {
        match self.captions {
            ImageCaptions::Shared(_) => JobKind::Standard,
            ImageCaptions::PerImage { .. } => JobKind::Multi,
        }
    }

    pub fn schedule(&self) -> Vec<ScheduleSlot> {
        match &self.captions {
            ImageCaptions::Shared(_) => vec![ScheduleSlot::Immediate],
            ImageCaptions::PerImage { interval_hours, .. } => {
                schedule(self.images.len(), *interval_hours)
            }
        }
    }

    /// Text fields of the `/submit-job` multipart form (images excluded).
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("job_type", self.kind().as_str().to_string()),
            (
                "add_text_overlay",
                if self.add_text_overlay { "1" } else { "0" }.to_string(),
            ),
            ("overlay_texts", to_json(&self.overlay_texts)),
        ];

        match &self.captions {
            ImageCaptions::Shared(captions) => {
                fields.push(("platform_captions", to_json(captions)));
            }
            ImageCaptions::PerImage {
                captions,
                interval_hours,
            } => {
                fields.push(("per_image_captions", to_json(captions)));
                if *interval_hours > 0.0 {
                    fields.push(("interval_hours", format_hours(*interval_hours)));
                }
            }
        }

        if let Some(size) = self.font_size {
            fields.push(("font_size", size.to_string()));
        }

        fields
    }
}

/// One already-uploaded video of a video job.
#[derive(Debug, Clone, Serialize)]
pub struct VideoPost {
    pub video_url: String,
    pub title: String,
    pub platform_captions: Captions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl VideoPost {
    /// Post a processed video with (possibly edited) captions.
    pub fn from_result(result: &VideoResult, captions: Captions) -> Self {
        Self {
            video_url: result.video_url.clone(),
            title: result.title.clone(),
            platform_captions: captions,
            thumbnail_url: result.thumbnail_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VideoMode {
    /// Post to the selected platforms.
    Standard { platforms: Vec<Platform> },
    /// YouTube only, unlisted.
    Special,
}

/// JSON body of `/submit-video-job`.
#[derive(Debug, Clone, Serialize)]
pub struct VideoJobRequest {
    job_type: JobKind,
    pub videos: Vec<VideoPost>,
    pub interval_hours: f64,
    pub multi_post: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<Platform>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_privacy: Option<String>,
}

impl VideoJobRequest {
    /// `multi_post` only takes effect with more than one video.
    pub fn new(videos: Vec<VideoPost>, interval_hours: f64, multi_post: bool, mode: VideoMode) -> Self {
        let multi_post = multi_post && videos.len() > 1;
        let (platforms, youtube_privacy) = match mode {
            VideoMode::Special => (Some(vec![Platform::Youtube]), Some("unlisted".to_string())),
            VideoMode::Standard { platforms } => {
                let subset = platforms.len() < Platform::VIDEO.len();
                (subset.then_some(platforms), None)
            }
        };

        Self {
            job_type: JobKind::Video,
            videos,
            interval_hours,
            multi_post,
            platforms,
            youtube_privacy,
        }
    }

    pub fn schedule(&self) -> Vec<ScheduleSlot> {
        if self.multi_post {
            schedule(self.videos.len(), self.interval_hours)
        } else {
            vec![ScheduleSlot::Immediate]
        }
    }

    /// Description recorded for the job: the first title, or a generic label.
    pub fn description(&self) -> String {
        let title = self
            .videos
            .first()
            .map(|v| v.title.trim())
            .filter(|t| !t.is_empty())
            .unwrap_or("Video post");
        truncate_description(title)
    }
}

pub fn truncate_description(text: &str) -> String {
    text.chars().take(DESCRIPTION_LEN).collect()
}

/// When an item of a multi-post batch goes out, relative to submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScheduleSlot {
    Immediate,
    After { hours: f64 },
}

impl ScheduleSlot {
    pub fn offset_hours(&self) -> f64 {
        match self {
            ScheduleSlot::Immediate => 0.0,
            ScheduleSlot::After { hours } => *hours,
        }
    }

    pub fn label(&self) -> String {
        match self {
            ScheduleSlot::Immediate => "Immediate".to_string(),
            ScheduleSlot::After { hours } => format!("+{}h", format_hours(*hours)),
        }
    }
}

/// Item `i` of `count` is posted `i × interval_hours` after submission.
pub fn schedule(count: usize, interval_hours: f64) -> Vec<ScheduleSlot> {
    (0..count)
        .map(|index| match index {
            0 => ScheduleSlot::Immediate,
            n => ScheduleSlot::After {
                hours: n as f64 * interval_hours,
            },
        })
        .collect()
}

fn format_hours(hours: f64) -> String {
    if hours.fract() == 0.0 {
        format!("{:.0}", hours)
    } else {
        hours.to_string()
    }
}

// Vec<String> and platform-keyed maps always serialize.
fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captions(pairs: &[(Platform, &str)]) -> Captions {
        pairs.iter().map(|(p, t)| (*p, t.to_string())).collect()
    }

    fn video(title: &str) -> VideoPost {
        VideoPost {
            video_url: format!("https://cdn.example/{}.mp4", title),
            title: title.to_string(),
            platform_captions: captions(&[(Platform::Youtube, "watch")]),
            thumbnail_url: None,
        }
    }

    fn field<'a>(fields: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_three_videos_multi_post_offsets() {
        let request = VideoJobRequest::new(
            vec![video("a"), video("b"), video("c")],
            3.0,
            true,
            VideoMode::Standard {
                platforms: Platform::VIDEO.to_vec(),
            },
        );

        let slots = request.schedule();
        let offsets: Vec<f64> = slots.iter().map(|s| s.offset_hours()).collect();
        assert_eq!(offsets, vec![0.0, 3.0, 6.0]);
        assert_eq!(slots[0], ScheduleSlot::Immediate);
        assert_eq!(slots[0].label(), "Immediate");
        assert_eq!(slots[2].label(), "+6h");
    }

    #[test]
    fn test_fractional_interval_label() {
        assert_eq!(schedule(2, 1.5)[1].label(), "+1.5h");
        assert!(schedule(0, 3.0).is_empty());
    }

    #[test]
    fn test_single_video_never_multi_posts() {
        let request = VideoJobRequest::new(
            vec![video("solo")],
            3.0,
            true,
            VideoMode::Standard {
                platforms: Platform::VIDEO.to_vec(),
            },
        );
        assert!(!request.multi_post);
        assert_eq!(request.schedule(), vec![ScheduleSlot::Immediate]);
    }

    #[test]
    fn test_special_mode_is_youtube_unlisted() {
        let request = VideoJobRequest::new(vec![video("a")], 3.0, false, VideoMode::Special);
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["job_type"], "video");
        assert_eq!(body["platforms"], serde_json::json!(["youtube"]));
        assert_eq!(body["youtube_privacy"], "unlisted");
        assert_eq!(body["videos"][0]["platform_captions"]["youtube"], "watch");
        assert!(body["videos"][0].get("thumbnail_url").is_none());
    }

    #[test]
    fn test_platforms_sent_only_for_subset() {
        let all = VideoJobRequest::new(
            vec![video("a")],
            3.0,
            false,
            VideoMode::Standard {
                platforms: Platform::VIDEO.to_vec(),
            },
        );
        let body = serde_json::to_value(&all).unwrap();
        assert!(body.get("platforms").is_none());
        assert!(body.get("youtube_privacy").is_none());

        let some = VideoJobRequest::new(
            vec![video("a")],
            3.0,
            false,
            VideoMode::Standard {
                platforms: vec![Platform::Tiktok, Platform::Youtube],
            },
        );
        let body = serde_json::to_value(&some).unwrap();
        assert_eq!(body["platforms"], serde_json::json!(["tiktok", "youtube"]));
    }

    #[test]
    fn test_standard_image_form() {
        let request = ImageJobRequest::standard(
            vec![
                MediaFile::from_bytes("a.jpg", vec![1u8]),
                MediaFile::from_bytes("b.jpg", vec![2u8]),
            ],
            captions(&[(Platform::Twitter, "hi")]),
        )
        .with_overlay(vec!["Big sale".into(), "Today".into()], true)
        .with_font_size(Some(0));

        let fields = request.form_fields();
        assert_eq!(request.kind(), JobKind::Standard);
        assert_eq!(field(&fields, "job_type"), Some("standard"));
        assert_eq!(field(&fields, "add_text_overlay"), Some("1"));
        assert_eq!(field(&fields, "overlay_texts"), Some(r#"["Big sale","Today"]"#));
        assert_eq!(field(&fields, "platform_captions"), Some(r#"{"twitter":"hi"}"#));
        assert_eq!(field(&fields, "per_image_captions"), None);
        assert_eq!(field(&fields, "font_size"), None);
    }

    #[test]
    fn test_multi_image_form() {
        let request = ImageJobRequest::multi(
            vec![
                MediaFile::from_bytes("a.jpg", vec![1u8]),
                MediaFile::from_bytes("b.jpg", vec![2u8]),
            ],
            vec![
                captions(&[(Platform::Instagram, "first")]),
                captions(&[(Platform::Instagram, "second")]),
            ],
            2.0,
        )
        .with_overlay(Vec::new(), false)
        .with_font_size(Some(48));

        let fields = request.form_fields();
        assert_eq!(request.kind(), JobKind::Multi);
        assert_eq!(field(&fields, "job_type"), Some("multi"));
        assert_eq!(field(&fields, "add_text_overlay"), Some("0"));
        assert_eq!(
            field(&fields, "per_image_captions"),
            Some(r#"[{"instagram":"first"},{"instagram":"second"}]"#)
        );
        assert_eq!(field(&fields, "interval_hours"), Some("2"));
        assert_eq!(field(&fields, "font_size"), Some("48"));
        assert_eq!(field(&fields, "platform_captions"), None);
        assert_eq!(request.schedule()[1], ScheduleSlot::After { hours: 2.0 });
    }

    #[test]
    fn test_video_description() {
        let request = VideoJobRequest::new(
            vec![video(&"t".repeat(60))],
            3.0,
            false,
            VideoMode::Special,
        );
        assert_eq!(request.description().len(), DESCRIPTION_LEN);

        let untitled = VideoJobRequest::new(vec![video("  ")], 3.0, false, VideoMode::Special);
        assert_eq!(untitled.description(), "Video post");
    }
}
