//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty stdout output
//! - Optional daily-rolling file output

use anyhow::Result;
use std::io;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::models::LoggingConfig;

/// Logger holding the file-appender guard; drop it and buffered log lines
/// are lost.
pub struct Logger {
    _guard: Option<WorkerGuard>,
}

impl Logger {
    /// Initialize the global subscriber from configuration.
    ///
    /// # Errors
    /// Returns an error on an unknown level or format string.
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let default_level = parse_log_level(&config.level)?;
        let env_filter = EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy();

        let guard = if let Some(ref log_dir) = config.log_dir {
            let file_appender = rolling::daily(log_dir, "mender.log");
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

            // File output is always JSON for downstream tooling.
            let file_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .with_target(true)
                .with_filter(env_filter.clone());

            match config.format.as_str() {
                "json" => {
                    let stdout_layer = tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(io::stdout)
                        .with_target(true)
                        .with_filter(env_filter);
                    tracing_subscriber::registry()
                        .with(file_layer)
                        .with(stdout_layer)
                        .init();
                }
                "pretty" => {
                    let stdout_layer = tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(io::stdout)
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE)
                        .with_filter(env_filter);
                    tracing_subscriber::registry()
                        .with(file_layer)
                        .with(stdout_layer)
                        .init();
                }
                other => anyhow::bail!("Invalid log format: {other}"),
            }

            Some(guard)
        } else {
            match config.format.as_str() {
                "json" => {
                    let stdout_layer = tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(io::stdout)
                        .with_target(true)
                        .with_filter(env_filter);
                    tracing_subscriber::registry().with(stdout_layer).init();
                }
                "pretty" => {
                    let stdout_layer = tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(io::stdout)
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE)
                        .with_filter(env_filter);
                    tracing_subscriber::registry().with(stdout_layer).init();
                }
                other => anyhow::bail!("Invalid log format: {other}"),
            }
            None
        };

        tracing::info!(
            level = %config.level,
            format = %config.format,
            file_output = config.log_dir.is_some(),
            "logger initialized"
        );

        Ok(Self { _guard: guard })
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!("Invalid log level: {level}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert!(matches!(parse_log_level("trace"), Ok(Level::TRACE)));
        assert!(matches!(parse_log_level("INFO"), Ok(Level::INFO)));
        assert!(matches!(parse_log_level("error"), Ok(Level::ERROR)));
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_logger_init_stdout_only() {
        let config = LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
            log_dir: None,
        };

        // Initializes the global subscriber; a second init in the same
        // process would panic, so this stays the only init test.
        let result = Logger::init(&config);
        assert!(result.is_ok());
    }
}
