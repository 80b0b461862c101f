//! Logging backend
//!
//! Library code logs through the `log` facade only. Applications embedding the
//! emitter can call [`init_logging`] to install a `flexi_logger` backend with
//! one of these formats, or install any other `log` implementation:
//!
//! - `text`: `2025-01-01 12:00:00.000 INF message`
//! - `ext`: text followed by the emitting module, `(emitter/bus.rs:42)`
//! - `json`: one compact object per record

use crate::core::sync::handle_mutex_poison;
use flexi_logger::{DeferredNow, FileSpec, FlexiLoggerError, Logger, LoggerHandle};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

static LOGGER_HANDLE: OnceLock<Mutex<LoggerHandle>> = OnceLock::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Ext,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level or full `flexi_logger` spec, e.g. `debug` or `info, mqbus::emitter=trace`
    pub level: String,
    pub format: LogFormat,
    /// Write to this file instead of stderr
    pub file: Option<PathBuf>,
    /// Colour level tags (ignored for `json`)
    pub color: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
            color: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("logger setup failed: {0}")]
    Logger(#[from] FlexiLoggerError),

    #[error("logging is already initialised")]
    AlreadyInitialised,

    #[error("logging is not initialised, call init_logging first")]
    NotInitialised,

    #[error("{0}")]
    Poisoned(String),
}

/// Install the global logger
///
/// Only the first successful call takes effect; later calls return
/// [`LoggingError::AlreadyInitialised`].
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    if LOGGER_HANDLE.get().is_some() {
        return Err(LoggingError::AlreadyInitialised);
    }

    let mut logger = Logger::try_with_str(&config.level)?;

    logger = match (config.format, config.color) {
        (LogFormat::Json, _) => logger.format(json_format),
        (LogFormat::Ext, true) => logger.format(extended_color_format),
        (LogFormat::Ext, false) => logger.format(extended_format),
        (LogFormat::Text, true) => logger.format(simple_color_format),
        (LogFormat::Text, false) => logger.format(simple_format),
    };

    if let Some(path) = &config.file {
        logger = logger.log_to_file(FileSpec::try_from(path.as_path())?);
    }

    let handle = logger.start()?;
    LOGGER_HANDLE
        .set(Mutex::new(handle))
        .map_err(|_| LoggingError::AlreadyInitialised)
}

/// Change the active log level at runtime
///
/// Format and output target are fixed when the logger starts; only the level
/// spec can be replaced.
pub fn reconfigure_log_level(level: &str) -> Result<(), LoggingError> {
    let handle = LOGGER_HANDLE.get().ok_or(LoggingError::NotInitialised)?;
    handle_mutex_poison(handle.lock(), LoggingError::Poisoned)?
        .parse_and_push_temp_spec(level)?;
    log::debug!("Log level changed to '{}'", level);
    Ok(())
}

fn level_tag(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERR",
        log::Level::Warn => "WRN",
        log::Level::Info => "INF",
        log::Level::Debug => "DBG",
        log::Level::Trace => "TRC",
    }
}

fn colored_level_tag(level: log::Level) -> colored::ColoredString {
    use colored::Colorize;

    let tag = level_tag(level);
    match level {
        log::Level::Error => tag.red().bold(),
        log::Level::Warn => tag.yellow(),
        log::Level::Info => tag.green(),
        log::Level::Debug => tag.blue(),
        log::Level::Trace => tag.magenta(),
    }
}

fn simple_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {}",
        now.format("%Y-%m-%d %H:%M:%S%.3f"),
        level_tag(record.level()),
        record.args()
    )
}

fn simple_color_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    use colored::Colorize;

    write!(
        w,
        "{} {} {}",
        now.format("%Y-%m-%d %H:%M:%S%.3f").to_string().dimmed(),
        colored_level_tag(record.level()),
        record.args()
    )
}

fn extended_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {} ({})",
        now.format("%Y-%m-%d %H:%M:%S%.3f"),
        level_tag(record.level()),
        record.args(),
        format_target_as_path(record.target(), record.line())
    )
}

fn extended_color_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    use colored::Colorize;

    write!(
        w,
        "{} {} {} ({})",
        now.format("%Y-%m-%d %H:%M:%S%.3f").to_string().dimmed(),
        colored_level_tag(record.level()),
        record.args(),
        format_target_as_path(record.target(), record.line()).dimmed()
    )
}

fn json_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    let entry = serde_json::json!({
        "timestamp": now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        "level": level_tag(record.level()),
        "message": record.args().to_string(),
        "target": format_target_as_path(record.target(), record.line()),
    });

    // compact, flexi_logger adds the line break
    match serde_json::to_string(&entry) {
        Ok(line) => w.write_all(line.as_bytes()),
        Err(_) => w.write_all(b"{\"error\":\"failed to serialize log record\"}"),
    }
}

/// `mqbus::emitter::bus` at line 42 becomes `emitter/bus.rs:42`
fn format_target_as_path(target: &str, line: Option<u32>) -> String {
    let path_like = match target.strip_prefix("mqbus::") {
        Some(module) => module.replace("::", "/") + ".rs",
        None => target.replace("::", "/"),
    };

    match line {
        Some(line) => format!("{}:{}", path_like, line),
        None => path_like,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn render(
        format: fn(&mut dyn std::io::Write, &mut DeferredNow, &log::Record) -> std::io::Result<()>,
        level: log::Level,
    ) -> String {
        let mut buffer = Vec::new();
        let mut now = DeferredNow::new();
        let record = log::Record::builder()
            .level(level)
            .target("mqbus::emitter::governor")
            .line(Some(42))
            .args(format_args!("queue drained"))
            .build();

        format(&mut buffer, &mut now, &record).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_format_target_as_path() {
        assert_eq!(
            format_target_as_path("mqbus::emitter::bus", Some(7)),
            "emitter/bus.rs:7"
        );
        assert_eq!(format_target_as_path("tokio::runtime", None), "tokio/runtime");
    }

    #[test]
    fn test_simple_format() {
        let output = render(simple_format, log::Level::Info);
        assert!(output.contains("INF queue drained"), "got: {}", output);
        assert!(!output.contains("governor"));
    }

    #[test]
    fn test_extended_format_includes_target() {
        let output = render(extended_format, log::Level::Warn);
        assert!(output.contains("WRN queue drained"), "got: {}", output);
        assert!(output.ends_with("(emitter/governor.rs:42)"));
    }

    #[test]
    fn test_json_format() {
        let output = render(json_format, log::Level::Debug);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["level"], "DBG");
        assert_eq!(parsed["message"], "queue drained");
        assert_eq!(parsed["target"], "emitter/governor.rs:42");
        assert!(!output.contains('\n'));
    }

    #[test]
    fn test_logging_config_from_toml() {
        let config: LoggingConfig = toml::from_str(
            r#"
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.color);
        assert_eq!(config.file, None);
    }

    #[test]
    #[serial]
    fn test_init_once_then_reconfigure() {
        assert!(matches!(
            reconfigure_log_level("debug"),
            Err(LoggingError::NotInitialised)
        ));

        let config = LoggingConfig {
            level: "warn".to_string(),
            color: false,
            ..Default::default()
        };
        init_logging(&config).unwrap();
        assert!(matches!(
            init_logging(&config),
            Err(LoggingError::AlreadyInitialised)
        ));

        assert!(reconfigure_log_level("trace").is_ok());
        log::trace!("logging reconfigured");
    }
}
