//! Layered configuration.
//!
//! Precedence, lowest first: built-in defaults, the TOML file, `POSTFLOW_*`
//! environment variables (nested keys joined with `__`), then CLI overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::api::retry::RetryPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "postflow.toml";

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Backend root, e.g. `https://api.example.com`. Empty means same host.
    pub api_base_url: String,
    pub database_path: PathBuf,
    /// Separates job history of different users sharing a database.
    pub profile: String,
    pub verbose: bool,
    pub json_logs: bool,
    pub upload: UploadConfig,
    pub jobs: JobsConfig,
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Hard ceiling; no destination accepts larger files.
    pub max_file_bytes: u64,
    pub attempts_per_target: u32,
    pub retry_base_delay_ms: u64,
    pub litterbox_url: String,
    pub litterbox_retention: String,
    pub litterbox_limit_bytes: u64,
    pub catbox_url: String,
    pub catbox_limit_bytes: u64,
    pub proxy_limit_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub poll_interval_ms: u64,
    pub status_attempts: u32,
    pub status_retry_base_delay_ms: u64,
    pub max_records: usize,
    pub stale_after_minutes: i64,
}

/// Per-endpoint request deadlines, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub process_secs: u64,
    pub regenerate_secs: u64,
    pub process_video_secs: u64,
    pub submit_image_job_secs: u64,
    pub submit_video_job_secs: u64,
    pub job_status_secs: u64,
    pub upload_proxy_secs: u64,
    pub upload_host_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            database_path: PathBuf::from("postflow.db"),
            profile: "default".to_string(),
            verbose: false,
            json_logs: false,
            upload: UploadConfig::default(),
            jobs: JobsConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 1000 * MIB,
            attempts_per_target: 2,
            retry_base_delay_ms: 2000,
            litterbox_url: "https://litterbox.catbox.moe/resources/serverside/llUpload.php"
                .to_string(),
            litterbox_retention: "1h".to_string(),
            litterbox_limit_bytes: 1024 * MIB,
            catbox_url: "https://catbox.moe/user/api.php".to_string(),
            catbox_limit_bytes: 200 * MIB,
            proxy_limit_bytes: 1000 * MIB,
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            status_attempts: 3,
            status_retry_base_delay_ms: 2000,
            max_records: 20,
            stale_after_minutes: 30,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            process_secs: 60,
            regenerate_secs: 30,
            process_video_secs: 720,
            submit_image_job_secs: 120,
            submit_video_job_secs: 30,
            job_status_secs: 10,
            upload_proxy_secs: 300,
            upload_host_secs: 600,
        }
    }
}

impl AppConfig {
    /// Load configuration, merging `overrides` (usually CLI arguments) last.
    pub fn load<T: Serialize>(path: &Path, overrides: Option<&T>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("POSTFLOW_").split("__"));

        if let Some(overrides) = overrides {
            figment = figment.merge(Serialized::defaults(overrides));
        }

        let config: AppConfig = figment
            .extract()
            .with_context(|| format!("Failed to load configuration ({})", path.display()))?;

        Ok(config)
    }

    /// Storage namespace for this profile's job history.
    pub fn jobs_namespace(&self) -> String {
        format!("jobs:{}", self.profile)
    }
}

impl UploadConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::linear(
            self.attempts_per_target,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }
}

impl JobsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn status_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.status_attempts,
            Duration::from_millis(self.status_retry_base_delay_ms),
        )
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.stale_after_minutes)
    }
}
