//! Structured build logs.
//!
//! Plugins and the emitter report non-fatal conditions as [`Log`] records
//! delivered to a [`LogHandler`]. The default handler forwards them to
//! `tracing`; hosts can install their own to collect or reformat them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Log code attached to `info`/`debug` records produced by plugins.
pub const PLUGIN_LOG: &str = "PLUGIN_LOG";
/// Log code attached to `warn` records produced by plugins.
pub const PLUGIN_WARNING: &str = "PLUGIN_WARNING";
/// Two output files differ only by letter case.
pub const FILE_NAME_CONFLICT: &str = "FILE_NAME_CONFLICT";
/// An output plugin declared a hook that only runs during the input stage.
pub const INPUT_HOOK_IN_OUTPUT_PLUGIN: &str = "INPUT_HOOK_IN_OUTPUT_PLUGIN";
/// A log position was passed where no source code is available.
pub const INVALID_LOG_POSITION: &str = "INVALID_LOG_POSITION";
/// A deprecated plugin API was used.
pub const DEPRECATED_FEATURE: &str = "DEPRECATED_FEATURE";

/// Severity of a build log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// No logging output
    Silent,
    /// Only errors
    Error,
    /// Errors and warnings
    Warn,
    /// Errors, warnings, and info (default)
    #[default]
    Info,
    /// All logs including debug
    Debug,
}

impl LogLevel {
    /// Name used in filters and configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Silent => "silent",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    /// Whether a record at `level` passes a threshold of `self`.
    ///
    /// `Silent` as a threshold lets nothing through; `Silent` as a record
    /// level is never emitted.
    pub fn allows(&self, level: LogLevel) -> bool {
        level != LogLevel::Silent && level.verbosity() <= self.verbosity()
    }

    fn verbosity(&self) -> u8 {
        match self {
            LogLevel::Silent => 0,
            LogLevel::Error => 1,
            LogLevel::Warn => 2,
            LogLevel::Info => 3,
            LogLevel::Debug => 4,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "silent" | "off" => Ok(LogLevel::Silent),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(format!("Invalid log level: {}", other)),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position inside a module's source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPosition {
    pub line: u32,
    pub column: u32,
}

/// A single build log record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub message: String,
    /// Machine readable code, e.g. [`PLUGIN_WARNING`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Code supplied by the plugin itself, preserved when the log is tagged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<String>,
    /// Module the log refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<LogPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl Log {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl From<&str> for Log {
    fn from(message: &str) -> Self {
        Log::new(message)
    }
}

impl From<String> for Log {
    fn from(message: String) -> Self {
        Log::new(message)
    }
}

impl fmt::Display for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(plugin) = &self.plugin {
            write!(f, "[plugin {}] ", plugin)?;
        }
        if let Some(id) = &self.id {
            write!(f, "{}: ", id)?;
        }
        f.write_str(&self.message)
    }
}

/// Receives build logs.
pub trait LogHandler: Send + Sync {
    fn on_log(&self, level: LogLevel, log: Log);
}

impl<F> LogHandler for F
where
    F: Fn(LogLevel, Log) + Send + Sync,
{
    fn on_log(&self, level: LogLevel, log: Log) {
        self(level, log)
    }
}

pub type SharedLogHandler = Arc<dyn LogHandler>;

/// Forwards logs to `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogHandler;

impl LogHandler for TracingLogHandler {
    fn on_log(&self, level: LogLevel, log: Log) {
        let plugin = log.plugin.as_deref().unwrap_or("");
        let code = log.code.as_deref().unwrap_or("");
        match level {
            LogLevel::Silent => {}
            LogLevel::Error => tracing::error!(plugin, code, "{}", log),
            LogLevel::Warn => tracing::warn!(plugin, code, "{}", log),
            LogLevel::Info => tracing::info!(plugin, code, "{}", log),
            LogLevel::Debug => tracing::debug!(plugin, code, "{}", log),
        }
    }
}

/// The handler used when the host doesn't install one.
pub fn default_log_handler() -> SharedLogHandler {
    Arc::new(TracingLogHandler)
}
