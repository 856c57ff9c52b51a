//! Logging and tracing initialization for postflow.
//!
//! Structured logging through the `tracing` ecosystem, printed either as
//! readable console lines or as JSON for machine parsing.

use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::AppConfig;

/// Configuration for the logging system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogConfig {
    /// Output logs as JSON (for machine parsing)
    pub json: bool,
    /// Enable verbose logging (sets default level to DEBUG)
    pub verbose: bool,
}

impl From<&AppConfig> for LogConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            json: config.json_logs,
            verbose: config.verbose,
        }
    }
}

impl LogConfig {
    /// Filter used when `RUST_LOG` is not set.
    pub fn default_filter(&self) -> String {
        let level = if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        };
        format!("postflow={}", level.as_str().to_lowercase())
    }
}

/// Initialize the tracing subscriber.
///
/// Call once, early in `main()` after config is loaded. `RUST_LOG`
/// overrides the level chosen here.
pub fn init(config: LogConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter()));

    if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(FmtSpan::CLOSE)
                    .with_current_span(true)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        // Logs go to stderr so command output on stdout stays clean
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_follows_verbose_flag() {
        assert_eq!(LogConfig::default().default_filter(), "postflow=info");
        let verbose = LogConfig {
            verbose: true,
            ..Default::default()
        };
        assert_eq!(verbose.default_filter(), "postflow=debug");
    }

    #[test]
    fn test_log_config_reads_app_config() {
        let config = AppConfig {
            json_logs: true,
            ..Default::default()
        };
        let log = LogConfig::from(&config);
        assert!(log.json);
        assert!(!log.verbose);
    }
}
