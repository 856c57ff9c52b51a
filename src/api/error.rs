//! Error taxonomy for backend and upload-host calls.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Number of body characters kept in diagnostics.
pub const SNIPPET_LEN: usize = 200;

/// Error returned by backend and upload-host operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request did not complete within its deadline and was aborted
    #[error("request to {url} timed out after {}s", .after.as_secs())]
    Timeout { url: String, after: Duration },

    /// Connection-level failure (DNS, TLS, reset, body stream)
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// Body could not be decoded
    #[error("server returned a malformed response: {snippet}")]
    MalformedResponse { snippet: String },

    /// Non-2xx status from an idempotent endpoint
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// File exceeds what any destination accepts
    #[error("file is too large ({} MB); maximum is {} MB", mib(.size), mib(.limit))]
    FileTooLarge { size: u64, limit: u64 },

    /// Every upload destination exhausted its attempts
    #[error("all upload methods failed:{}", format_failures(.attempts))]
    AllDestinationsFailed { attempts: Vec<DestinationFailure> },

    /// Non-2xx status from a job submission endpoint
    #[error("submission rejected with HTTP {status}: {body}")]
    SubmissionRejected { status: u16, body: String },

    #[error("job not found: {0}")]
    JobNotFound(String),

    /// Local media file could not be read
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn mib(bytes: &u64) -> u64 {
    bytes / (1024 * 1024)
}

/// Last error observed for one destination of the upload cascade.
#[derive(Debug)]
pub struct DestinationFailure {
    pub target: String,
    pub attempts: u32,
    pub error: Box<ClientError>,
}

fn format_failures(attempts: &[DestinationFailure]) -> String {
    attempts
        .iter()
        .map(|f| format!("\n  - {} ({} attempts): {}", f.target, f.attempts, f.error))
        .collect()
}

impl ClientError {
    /// Whether a retry of an idempotent request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::NetworkFailure(_) => true,
            ClientError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether the request never reached the server intact (upload/network trouble
    /// rather than a processing error returned by the backend).
    pub fn is_delivery_failure(&self) -> bool {
        matches!(
            self,
            ClientError::Timeout { .. } | ClientError::NetworkFailure(_)
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::NetworkFailure(e.to_string())
    }
}

/// First `SNIPPET_LEN` characters of a body, for error messages.
pub fn snippet(body: &str) -> String {
    body.chars().take(SNIPPET_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_covers_network_and_5xx_only() {
        assert!(ClientError::NetworkFailure("reset".into()).is_transient());
        assert!(
            ClientError::Http {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !ClientError::Http {
                status: 404,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !ClientError::Timeout {
                url: "http://x".into(),
                after: Duration::from_secs(1)
            }
            .is_transient()
        );
        assert!(
            !ClientError::SubmissionRejected {
                status: 500,
                body: String::new()
            }
            .is_transient()
        );
    }

    #[test]
    fn test_snippet_truncates_on_char_boundary() {
        let body = "é".repeat(300);
        assert_eq!(snippet(&body).chars().count(), SNIPPET_LEN);
        assert_eq!(snippet("short"), "short");
    }

    #[test]
    fn test_aggregate_error_lists_every_destination() {
        let err = ClientError::AllDestinationsFailed {
            attempts: vec![
                DestinationFailure {
                    target: "litterbox".into(),
                    attempts: 2,
                    error: Box::new(ClientError::NetworkFailure("reset".into())),
                },
                DestinationFailure {
                    target: "proxy".into(),
                    attempts: 2,
                    error: Box::new(ClientError::Http {
                        status: 502,
                        body: "bad gateway".into(),
                    }),
                },
            ],
        };

        let msg = err.to_string();
        assert!(msg.contains("litterbox (2 attempts): network failure: reset"));
        assert!(msg.contains("proxy (2 attempts): HTTP 502: bad gateway"));
    }
}
