use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
    Linkedin,
    Pinterest,
    Tiktok,
    Twitter,
    Youtube,
}

impl Platform {
    /// Platforms an image post can go to.
    pub const IMAGE: [Platform; 6] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::Linkedin,
        Platform::Pinterest,
        Platform::Tiktok,
        Platform::Twitter,
    ];

    /// Platforms a video post can go to.
    pub const VIDEO: [Platform; 7] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::Linkedin,
        Platform::Pinterest,
        Platform::Tiktok,
        Platform::Twitter,
        Platform::Youtube,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Linkedin => "linkedin",
            Platform::Pinterest => "pinterest",
            Platform::Tiktok => "tiktok",
            Platform::Twitter => "twitter",
            Platform::Youtube => "youtube",
        }
    }

    /// Maximum caption length accepted by the platform, in characters.
    pub fn caption_limit(&self) -> usize {
        match self {
            Platform::Facebook => 63206,
            Platform::Instagram => 2200,
            Platform::Linkedin => 3000,
            Platform::Pinterest => 800,
            Platform::Tiktok => 2200,
            Platform::Twitter => 280,
            Platform::Youtube => 5000,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::VIDEO
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown platform: {}", s))
    }
}

/// Caption text per platform.
pub type Captions = BTreeMap<Platform, String>;

/// Platforms whose caption exceeds that platform's limit.
pub fn over_limit(captions: &Captions) -> Vec<Platform> {
    captions
        .iter()
        .filter(|(platform, text)| text.chars().count() > platform.caption_limit())
        .map(|(platform, _)| *platform)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Uploading,
    Posting,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Uploading => "uploading",
            JobStatus::Posting => "posting",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    /// No further transitions or polling once here.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    /// Human-readable progress line for the status.
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Pending => "Queued...",
            JobStatus::Processing => "Processing images...",
            JobStatus::Uploading => "Uploading to hosting...",
            JobStatus::Posting => "Posting to platforms...",
            JobStatus::Done => "Job complete!",
            JobStatus::Failed => "Job failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "uploading" => Ok(JobStatus::Uploading),
            "posting" => Ok(JobStatus::Posting),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Standard,
    Multi,
    Video,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Standard => "standard",
            JobKind::Multi => "multi",
            JobKind::Video => "video",
        }
    }
}

/// A successfully submitted job.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    pub created_at: DateTime<Utc>,
    pub description: String,
}

/// Persisted bookkeeping entry for a submitted job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub desc: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub status: JobStatus,
}
