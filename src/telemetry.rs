//! Tracing subscriber setup
//!
//! The library only emits `tracing` events; binaries and tests decide where
//! they go. This module offers a ready-made subscriber.
//!
//! ```rust,no_run
//! use llm_relay::telemetry::{OutputFormat, SubscriberConfig, init_subscriber};
//!
//! let config = SubscriberConfig::builder()
//!     .log_level(tracing::Level::DEBUG)
//!     .output_format(OutputFormat::Json)
//!     .build();
//! let _guard = init_subscriber(config)?;
//! # Ok::<(), llm_relay::LlmError>(())
//! ```

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::error::LlmError;

/// Environment variable holding the log level.
pub const LOG_LEVEL_ENV: &str = "LLM_RELAY_LOG_LEVEL";
/// Environment variable holding the output format.
pub const LOG_FORMAT_ENV: &str = "LLM_RELAY_LOG_FORMAT";
/// Environment variable holding a log file path.
pub const LOG_FILE_ENV: &str = "LLM_RELAY_LOG_FILE";

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// One JSON object per event
    Json,
    /// JSON with event fields flattened into the top level
    JsonCompact,
}

impl std::str::FromStr for OutputFormat {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "json-compact" | "json_compact" => Ok(Self::JsonCompact),
            other => Err(LlmError::ConfigurationError(format!(
                "Invalid log format: {other}. Valid options: text, json, json-compact"
            ))),
        }
    }
}

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    pub log_level: tracing::Level,
    pub output_format: OutputFormat,
    /// Write to stderr when no log file is set
    pub enable_console: bool,
    /// Append to this file instead of the console
    pub log_file: Option<PathBuf>,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            log_level: tracing::Level::INFO,
            output_format: OutputFormat::Text,
            enable_console: true,
            log_file: None,
        }
    }
}

impl SubscriberConfig {
    pub fn builder() -> SubscriberConfigBuilder {
        SubscriberConfigBuilder::default()
    }

    pub fn debug() -> Self {
        Self {
            log_level: tracing::Level::DEBUG,
            ..Self::default()
        }
    }

    /// Warnings and above as JSON into `log_file`.
    pub fn production(log_file: PathBuf) -> Self {
        Self {
            log_level: tracing::Level::WARN,
            output_format: OutputFormat::Json,
            enable_console: false,
            log_file: Some(log_file),
        }
    }

    /// Directive string for the crate's events.
    pub fn filter_directive(&self) -> String {
        format!(
            "llm_relay={}",
            self.log_level.as_str().to_ascii_lowercase()
        )
    }
}

#[derive(Debug, Default)]
pub struct SubscriberConfigBuilder {
    log_level: Option<tracing::Level>,
    output_format: Option<OutputFormat>,
    enable_console: Option<bool>,
    log_file: Option<PathBuf>,
}

impl SubscriberConfigBuilder {
    pub fn log_level(mut self, level: tracing::Level) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Set the level from its name (`trace` .. `error`).
    pub fn log_level_str(mut self, level: &str) -> Result<Self, LlmError> {
        let parsed = level.trim().parse::<tracing::Level>().map_err(|_| {
            LlmError::ConfigurationError(format!(
                "Invalid log level: {level}. Valid options: trace, debug, info, warn, error"
            ))
        })?;
        self.log_level = Some(parsed);
        Ok(self)
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn enable_console(mut self, enable: bool) -> Self {
        self.enable_console = Some(enable);
        self
    }

    pub fn log_file(mut self, path: PathBuf) -> Self {
        self.log_file = Some(path);
        self
    }

    pub fn build(self) -> SubscriberConfig {
        SubscriberConfig {
            log_level: self.log_level.unwrap_or(tracing::Level::INFO),
            output_format: self.output_format.unwrap_or_default(),
            enable_console: self.enable_console.unwrap_or(true),
            log_file: self.log_file,
        }
    }
}

fn make_writer(config: &SubscriberConfig) -> Result<(BoxMakeWriter, Option<WorkerGuard>), LlmError> {
    match &config.log_file {
        Some(path) => {
            let file_name = path.file_name().ok_or_else(|| {
                LlmError::ConfigurationError(format!("Log file path has no file name: {}", path.display()))
            })?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            Ok((BoxMakeWriter::new(writer), Some(guard)))
        }
        None if config.enable_console => Ok((BoxMakeWriter::new(std::io::stderr), None)),
        None => Ok((BoxMakeWriter::new(std::io::sink), None)),
    }
}

/// Install a global subscriber.
///
/// Returns the worker guard when logging to a file; keep it alive for the
/// lifetime of the program. Installing when a subscriber already exists is
/// not an error.
pub fn init_subscriber(config: SubscriberConfig) -> Result<Option<WorkerGuard>, LlmError> {
    let filter = config.filter_directive();
    let (writer, guard) = make_writer(&config)?;

    let init_result = match config.output_format {
        OutputFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .json()
            .try_init(),
        OutputFormat::JsonCompact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_target(true)
            .json()
            .flatten_event(true)
            .try_init(),
        OutputFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_target(true)
            .try_init(),
    };

    match init_result {
        Ok(()) => Ok(guard),
        Err(e) if e.to_string().contains("already") => Ok(guard),
        Err(e) => Err(LlmError::ConfigurationError(format!(
            "Failed to initialize tracing: {e}"
        ))),
    }
}

pub fn init_default() -> Result<Option<WorkerGuard>, LlmError> {
    init_subscriber(SubscriberConfig::default())
}

/// Read `LLM_RELAY_LOG_LEVEL`, `LLM_RELAY_LOG_FORMAT` and `LLM_RELAY_LOG_FILE`.
pub fn config_from_env() -> Result<SubscriberConfig, LlmError> {
    let mut builder = SubscriberConfig::builder();
    if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
        builder = builder.log_level_str(&level)?;
    }
    if let Ok(format) = std::env::var(LOG_FORMAT_ENV) {
        builder = builder.output_format(format.parse()?);
    }
    if let Ok(path) = std::env::var(LOG_FILE_ENV) {
        builder = builder.log_file(PathBuf::from(path));
    }
    Ok(builder.build())
}

pub fn init_from_env() -> Result<Option<WorkerGuard>, LlmError> {
    init_subscriber(config_from_env()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_parses_level_names() {
        let config = SubscriberConfig::builder()
            .log_level_str("DEBUG")
            .unwrap()
            .build();
        assert_eq!(config.log_level, tracing::Level::DEBUG);
        assert_eq!(config.filter_directive(), "llm_relay=debug");
        assert!(SubscriberConfig::builder().log_level_str("loud").is_err());
    }

    #[test]
    fn output_format_names() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "json-compact".parse::<OutputFormat>().unwrap(),
            OutputFormat::JsonCompact
        );
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn production_preset() {
        let config = SubscriberConfig::production(PathBuf::from("/tmp/relay.log"));
        assert_eq!(config.output_format, OutputFormat::Json);
        assert!(!config.enable_console);
    }

    #[test]
    fn init_twice_is_not_an_error() {
        let quiet = SubscriberConfig::builder().enable_console(false).build();
        assert!(init_subscriber(quiet.clone()).is_ok());
        assert!(init_subscriber(quiet).is_ok());
    }
}
