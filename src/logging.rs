//! Structured logging setup
//!
//! Human-readable or JSON output on stderr, with optional file output in
//! addition. `RUST_LOG` takes precedence over the configured level.

use crate::config::LoggingConfig;
use crate::error::Result;
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the level filter for `config`
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    Ok(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?)
}

/// Initialize logging based on configuration.
///
/// # Errors
///
/// Returns an error if the level directive is invalid, the log file cannot
/// be opened, or a global subscriber is already installed.
///
/// # Examples
///
/// ```no_run
/// use tokensend::config::LoggingConfig;
/// use tokensend::logging::init_logging;
///
/// let config = LoggingConfig {
///     level: "tokensend=debug".to_string(),
///     json_format: true,
///     file_path: None,
/// };
///
/// init_logging(&config).unwrap();
/// ```
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(config)?);

    let file = match &config.file_path {
        Some(path) => Some(Arc::new(
            OpenOptions::new().create(true).append(true).open(path)?,
        )),
        None => None,
    };

    if config.json_format {
        let stderr_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr);
        let file_layer = file.map(|file| fmt::layer().json().with_current_span(true).with_writer(file));
        registry.with(stderr_layer).with(file_layer).try_init()?;
    } else {
        let stderr_layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr);
        let file_layer = file.map(|file| {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .with_writer(file)
        });
        registry.with(stderr_layer).with(file_layer).try_init()?;
    }

    Ok(())
}
