//! Structured logging for the interaction engine.
//!
//! The logger is constructed once at harness start and handed by reference
//! to the components that need it; nothing reads it through a global. An
//! optional external sink receives every record, which keeps the engine
//! observable in tests and lets reporting tooling consume log output without
//! scraping stdout.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Convenience alias for external logging callbacks.
pub type LogSink = Arc<dyn Fn(&TestLogRecord) + Send + Sync + 'static>;

/// Log severity used across the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

/// Logging configuration shared across one engine instance.
#[derive(Clone)]
pub struct LogConfig {
    /// Most verbose level that will be emitted.
    pub min_level: LogLevel,
    pub sink: Option<LogSink>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            sink: None,
        }
    }
}

impl LogConfig {
    pub fn new(min_level: LogLevel) -> Self {
        Self {
            min_level,
            ..Default::default()
        }
    }

    pub fn should_log(&self, level: LogLevel) -> bool {
        level.as_u8() <= self.min_level.as_u8()
    }
}

/// Structured log entry shared with external sinks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestLogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auxiliary: Option<Value>,
}

impl TestLogRecord {
    pub fn new(
        message: impl Into<String>,
        level: LogLevel,
        category: Option<String>,
        auxiliary: Option<Value>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            category,
            auxiliary,
        }
    }
}

/// Default console printer used when no external sink is configured.
pub fn default_log_handler(record: &TestLogRecord) {
    let timestamp = record
        .timestamp
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    if let Some(category) = &record.category {
        println!(
            "[{}] {:<5} [{}] {}",
            timestamp,
            record.level.label(),
            category,
            record.message
        );
    } else {
        println!(
            "[{}] {:<5} {}",
            timestamp,
            record.level.label(),
            record.message
        );
    }
    if let Some(aux) = &record.auxiliary {
        if !aux.is_null() {
            println!("    {}", aux);
        }
    }
}

/// Engine logger with level filtering and an optional external sink.
pub struct TestLogger {
    config: LogConfig,
    default_handler: LogSink,
}

impl fmt::Debug for TestLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestLogger")
            .field("min_level", &self.config.min_level)
            .field("sink", &self.config.sink.is_some())
            .finish()
    }
}

impl Default for TestLogger {
    fn default() -> Self {
        Self::with_config(LogConfig::default())
    }
}

impl TestLogger {
    pub fn with_config(config: LogConfig) -> Self {
        Self {
            config,
            default_handler: Arc::new(default_log_handler),
        }
    }

    pub fn new(min_level: LogLevel) -> Self {
        Self::with_config(LogConfig::new(min_level))
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn set_sink(&mut self, sink: Option<LogSink>) {
        self.config.sink = sink;
    }

    pub fn log(
        &self,
        message: impl Into<String>,
        level: LogLevel,
        category: Option<&str>,
        auxiliary: Option<Value>,
    ) {
        if !self.config.should_log(level) {
            return;
        }

        let record = TestLogRecord::new(message, level, category.map(|c| c.to_string()), auxiliary);

        if let Some(sink) = &self.config.sink {
            sink(&record);
        } else {
            (self.default_handler)(&record);
        }
    }

    pub fn error(
        &self,
        message: impl Into<String>,
        category: Option<&str>,
        auxiliary: Option<Value>,
    ) {
        self.log(message, LogLevel::Error, category, auxiliary);
    }

    pub fn warn(
        &self,
        message: impl Into<String>,
        category: Option<&str>,
        auxiliary: Option<Value>,
    ) {
        self.log(message, LogLevel::Warn, category, auxiliary);
    }

    pub fn info(
        &self,
        message: impl Into<String>,
        category: Option<&str>,
        auxiliary: Option<Value>,
    ) {
        self.log(message, LogLevel::Info, category, auxiliary);
    }

    pub fn debug(
        &self,
        message: impl Into<String>,
        category: Option<&str>,
        auxiliary: Option<Value>,
    ) {
        self.log(message, LogLevel::Debug, category, auxiliary);
    }
}
