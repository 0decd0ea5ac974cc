//! Process logging configuration.
use serde::Deserialize;
use serde::Serialize;

/// Process logging configuration.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LogConf {
    /// Emit log records from a background thread.
    #[serde(default = "LogConf::default_async", rename = "async")]
    pub async_: bool,

    /// Format log records are emitted in.
    #[serde(default)]
    pub format: LogFormat,

    /// Minimum level of emitted records.
    #[serde(default)]
    pub level: LogLevel,
}

impl LogConf {
    fn default_async() -> bool {
        true
    }
}

impl Default for LogConf {
    fn default() -> Self {
        LogConf {
            async_: LogConf::default_async(),
            format: LogFormat::default(),
            level: LogLevel::default(),
        }
    }
}

/// Format log records are emitted in.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per record, on standard output.
    #[default]
    Json,

    /// Human readable records, on the terminal.
    Term,
}

/// Minimum level of emitted records.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Critical,
    Error,
    Warning,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for slog::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Critical => slog::Level::Critical,
            LogLevel::Error => slog::Level::Error,
            LogLevel::Warning => slog::Level::Warning,
            LogLevel::Info => slog::Level::Info,
            LogLevel::Debug => slog::Level::Debug,
            LogLevel::Trace => slog::Level::Trace,
        }
    }
}
