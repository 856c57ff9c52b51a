//! Client for the media-processing backend.
//!
//! ## Layout
//!
//! - `transport`: deadline-enforcing request wrapper and defensive JSON decoding
//! - `error`: typed failures shared with the upload cascade
//! - `retry`: bounded backoff schedules
//! - `types`: wire types and the job-result decoder
//! - `preview`: `/process`, `/regenerate` and `/process-video`
//! - `jobs`: job submission and status polling endpoints

pub mod error;
mod jobs;
mod preview;
pub mod retry;
pub mod transport;
pub mod types;

use std::time::Duration;

use crate::config::{AppConfig, TimeoutConfig};
use crate::upload::UploadCascade;

pub use error::{ClientError, DestinationFailure};
pub use retry::RetryPolicy;
pub use transport::Transport;

/// Backend client. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ApiClient {
    transport: Transport,
    base_url: String,
    timeouts: TimeoutConfig,
    status_retry: RetryPolicy,
    cascade: UploadCascade,
}

impl ApiClient {
    pub fn new(config: &AppConfig) -> Result<Self, ClientError> {
        let transport = Transport::new()?;
        let cascade = UploadCascade::from_config(config, transport.clone());
        Ok(Self::with_cascade(config, transport, cascade))
    }

    /// Build a client around an explicit transport and upload cascade.
    pub fn with_cascade(config: &AppConfig, transport: Transport, cascade: UploadCascade) -> Self {
        Self {
            transport,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            timeouts: config.timeouts.clone(),
            status_retry: config.jobs.status_retry_policy(),
            cascade,
        }
    }

    pub fn cascade(&self) -> &UploadCascade {
        &self.cascade
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn timeout(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }
}
