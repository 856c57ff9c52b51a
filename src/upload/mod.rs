//! Upload cascade for large media.
//!
//! Produces a publicly fetchable URL for a file by trying independent
//! destinations in a fixed priority order:
//!
//! 1. litterbox: direct host, largest allowance, one hour retention
//! 2. catbox: direct host, 200 MiB allowance, permanent
//! 3. the backend's `/upload-proxy`, last resort
//!
//! Destinations are attempted strictly one after another, each with its own
//! bounded retry budget.

mod host;
mod media;
mod proxy;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::api::error::{ClientError, DestinationFailure};
use crate::api::retry::RetryPolicy;
use crate::api::transport::Transport;
use crate::config::AppConfig;

pub use host::DirectHost;
pub use media::MediaFile;
pub use proxy::ProxyUpload;

/// A remote destination that can turn a file into a URL.
#[async_trait]
pub trait UploadTarget: Send + Sync {
    fn name(&self) -> &str;

    /// Largest file this destination accepts, in bytes.
    fn size_limit(&self) -> u64;

    /// Upload once and return the public URL.
    async fn attempt(&self, file: &MediaFile) -> Result<String, ClientError>;
}

/// Ordered set of upload destinations with a shared retry policy.
#[derive(Clone)]
pub struct UploadCascade {
    targets: Vec<Arc<dyn UploadTarget>>,
    max_file_bytes: u64,
    retry: RetryPolicy,
}

impl UploadCascade {
    pub fn new(targets: Vec<Arc<dyn UploadTarget>>, max_file_bytes: u64, retry: RetryPolicy) -> Self {
        Self {
            targets,
            max_file_bytes,
            retry,
        }
    }

    /// Build the standard litterbox → catbox → proxy cascade from config.
    pub fn from_config(config: &AppConfig, transport: Transport) -> Self {
        let host_timeout = Duration::from_secs(config.timeouts.upload_host_secs);
        let targets: Vec<Arc<dyn UploadTarget>> = vec![
            Arc::new(DirectHost::litterbox(
                transport.clone(),
                &config.upload,
                host_timeout,
            )),
            Arc::new(DirectHost::catbox(
                transport.clone(),
                &config.upload,
                host_timeout,
            )),
            Arc::new(ProxyUpload::new(
                transport,
                &config.api_base_url,
                config.upload.proxy_limit_bytes,
                Duration::from_secs(config.timeouts.upload_proxy_secs),
            )),
        ];

        Self::new(
            targets,
            config.upload.max_file_bytes,
            config.upload.retry_policy(),
        )
    }

    /// Reject files above the global ceiling before any network call.
    pub fn check_size(&self, file: &MediaFile) -> Result<(), ClientError> {
        if file.size() > self.max_file_bytes {
            return Err(ClientError::FileTooLarge {
                size: file.size(),
                limit: self.max_file_bytes,
            });
        }
        Ok(())
    }

    /// Upload `file`, walking the destinations until one returns a URL.
    pub async fn upload(&self, file: &MediaFile) -> Result<String, ClientError> {
        self.check_size(file)?;

        let mut failures = Vec::new();

        for target in &self.targets {
            if file.size() > target.size_limit() {
                info!(
                    destination = target.name(),
                    size = file.size(),
                    limit = target.size_limit(),
                    "Skipping upload destination: file exceeds its limit"
                );
                continue;
            }

            match self.try_target(target.as_ref(), file).await {
                Ok(url) => {
                    info!(destination = target.name(), %url, "Upload succeeded");
                    return Ok(url);
                }
                Err((attempts, error)) => {
                    warn!(destination = target.name(), attempts, error = %error, "Upload destination exhausted");
                    failures.push(DestinationFailure {
                        target: target.name().to_string(),
                        attempts,
                        error: Box::new(error),
                    });
                }
            }
        }

        Err(ClientError::AllDestinationsFailed { attempts: failures })
    }

    /// Run one destination's retry budget. On failure returns the number of
    /// attempts made and the last error.
    async fn try_target(
        &self,
        target: &dyn UploadTarget,
        file: &MediaFile,
    ) -> Result<String, (u32, ClientError)> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match target.attempt(file).await {
                Ok(url) => return Ok(url),
                Err(e) => {
                    warn!(
                        destination = target.name(),
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %e,
                        "Upload attempt failed"
                    );
                    match self.retry.delay_after(attempt) {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => return Err((attempt, e)),
                    }
                }
            }
        }
    }
}
