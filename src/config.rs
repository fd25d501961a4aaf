//! Strongly-typed engine configuration.
//!
//! Configuration is resolved once, before any browser work starts: values
//! come from defaults, from environment variables (with optional `.env`
//! support), or from explicit overrides applied programmatically. The rest
//! of the engine consumes the resolved [`EngineConfig`] and never reads the
//! environment itself.

use std::env;
use std::num::{ParseFloatError, ParseIntError};
use std::path::PathBuf;
use std::time::Duration;

use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::driver::SessionCapabilities;
use crate::retry::RetryPolicy;

/// Browser engine a session should run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    Chromium,
    Firefox,
    Edge,
}

impl Default for BrowserKind {
    fn default() -> Self {
        BrowserKind::Chromium
    }
}

impl BrowserKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Some(BrowserKind::Chromium),
            "firefox" => Some(BrowserKind::Firefox),
            "edge" => Some(BrowserKind::Edge),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Edge => "edge",
        }
    }
}

/// Viewport dimensions requested at session creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            width: 1366,
            height: 768,
        }
    }
}

/// Resolved configuration for one engine instance.
///
/// Durations are stored as millisecond fields so the struct round-trips
/// through serde and the environment cleanly; `Duration` accessors are
/// provided for the call sites that need them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub browser: BrowserKind,
    pub headless: bool,
    pub script_execution: bool,
    pub image_loading: bool,
    pub viewport: Viewport,
    pub implicit_wait_ms: u64,
    pub explicit_wait_ms: u64,
    pub poll_interval_ms: u64,
    pub retry_max_attempts: u32,
    pub retry_delay_ms: u64,
    pub retry_backoff_factor: Option<f64>,
    pub retry_max_delay_ms: u64,
    pub screenshot_on_failure: bool,
    pub diagnostics_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            browser: BrowserKind::default(),
            headless: false,
            script_execution: true,
            image_loading: true,
            viewport: Viewport::default(),
            implicit_wait_ms: 10_000,
            explicit_wait_ms: 10_000,
            poll_interval_ms: 500,
            retry_max_attempts: 3,
            retry_delay_ms: 1_000,
            retry_backoff_factor: Some(2.0),
            retry_max_delay_ms: 8_000,
            screenshot_on_failure: true,
            diagnostics_dir: PathBuf::from("screenshots"),
        }
    }
}

impl EngineConfig {
    /// Construct a configuration by reading `STEADFAST_*` environment
    /// variables, after loading a `.env` file if one is present.
    pub fn from_env() -> Result<Self, EngineConfigError> {
        let _ = dotenv();
        let mut config = EngineConfig::default();

        if let Some(value) = env_var("STEADFAST_BROWSER") {
            config.browser = BrowserKind::parse(&value)
                .ok_or_else(|| EngineConfigError::invalid_enum("STEADFAST_BROWSER", value))?;
        }

        if let Some(value) = env_var("STEADFAST_HEADLESS") {
            config.headless = parse_bool("STEADFAST_HEADLESS", &value)?;
        }

        if let Some(value) = env_var("STEADFAST_SCRIPT_EXECUTION") {
            config.script_execution = parse_bool("STEADFAST_SCRIPT_EXECUTION", &value)?;
        }

        if let Some(value) = env_var("STEADFAST_IMAGE_LOADING") {
            config.image_loading = parse_bool("STEADFAST_IMAGE_LOADING", &value)?;
        }

        if let Some(value) = env_var("STEADFAST_VIEWPORT") {
            config.viewport = parse_viewport("STEADFAST_VIEWPORT", &value)?;
        }

        if let Some(value) = env_var("STEADFAST_IMPLICIT_WAIT_MS") {
            config.implicit_wait_ms = parse_u64("STEADFAST_IMPLICIT_WAIT_MS", &value)?;
        }

        if let Some(value) = env_var("STEADFAST_EXPLICIT_WAIT_MS") {
            config.explicit_wait_ms = parse_u64("STEADFAST_EXPLICIT_WAIT_MS", &value)?;
        }

        if let Some(value) = env_var("STEADFAST_POLL_INTERVAL_MS") {
            config.poll_interval_ms = parse_u64("STEADFAST_POLL_INTERVAL_MS", &value)?;
        }

        if let Some(value) = env_var("STEADFAST_RETRY_MAX_ATTEMPTS") {
            config.retry_max_attempts = parse_u32("STEADFAST_RETRY_MAX_ATTEMPTS", &value)?;
        }

        if let Some(value) = env_var("STEADFAST_RETRY_DELAY_MS") {
            config.retry_delay_ms = parse_u64("STEADFAST_RETRY_DELAY_MS", &value)?;
        }

        if let Some(value) = env_var("STEADFAST_RETRY_BACKOFF_FACTOR") {
            config.retry_backoff_factor =
                Some(parse_f64("STEADFAST_RETRY_BACKOFF_FACTOR", &value)?);
        }

        if let Some(value) = env_var("STEADFAST_RETRY_MAX_DELAY_MS") {
            config.retry_max_delay_ms = parse_u64("STEADFAST_RETRY_MAX_DELAY_MS", &value)?;
        }

        if let Some(value) = env_var("STEADFAST_SCREENSHOT_ON_FAILURE") {
            config.screenshot_on_failure = parse_bool("STEADFAST_SCREENSHOT_ON_FAILURE", &value)?;
        }

        if let Some(value) = env_var("STEADFAST_DIAGNOSTICS_DIR") {
            config.diagnostics_dir = PathBuf::from(value);
        }

        Ok(config)
    }

    /// Create a new configuration with explicit field overrides applied.
    pub fn with_overrides(&self, overrides: EngineConfigOverrides) -> EngineConfig {
        let mut next = self.clone();

        if let Some(value) = overrides.browser {
            next.browser = value;
        }
        if let Some(value) = overrides.headless {
            next.headless = value;
        }
        if let Some(value) = overrides.script_execution {
            next.script_execution = value;
        }
        if let Some(value) = overrides.image_loading {
            next.image_loading = value;
        }
        if let Some(value) = overrides.viewport {
            next.viewport = value;
        }
        if let Some(value) = overrides.implicit_wait_ms {
            next.implicit_wait_ms = value;
        }
        if let Some(value) = overrides.explicit_wait_ms {
            next.explicit_wait_ms = value;
        }
        if let Some(value) = overrides.poll_interval_ms {
            next.poll_interval_ms = value;
        }
        if let Some(value) = overrides.retry_max_attempts {
            next.retry_max_attempts = value;
        }
        if let Some(value) = overrides.retry_delay_ms {
            next.retry_delay_ms = value;
        }
        if let Some(value) = overrides.retry_backoff_factor {
            next.retry_backoff_factor = value;
        }
        if let Some(value) = overrides.retry_max_delay_ms {
            next.retry_max_delay_ms = value;
        }
        if let Some(value) = overrides.screenshot_on_failure {
            next.screenshot_on_failure = value;
        }
        if let Some(value) = overrides.diagnostics_dir {
            next.diagnostics_dir = value;
        }

        next
    }

    pub fn implicit_wait(&self) -> Duration {
        Duration::from_millis(self.implicit_wait_ms)
    }

    pub fn explicit_wait(&self) -> Duration {
        Duration::from_millis(self.explicit_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Retry policy derived from the resolved retry fields. Constructed once
    /// per engine instance and immutable thereafter.
    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_delay_ms),
        );
        match self.retry_backoff_factor {
            Some(factor) => {
                policy.with_backoff(factor, Duration::from_millis(self.retry_max_delay_ms))
            }
            None => policy,
        }
    }

    /// Session parameters handed to the driver at session creation.
    pub fn capabilities(&self) -> SessionCapabilities {
        SessionCapabilities {
            browser: self.browser,
            headless: self.headless,
            script_execution: self.script_execution,
            image_loading: self.image_loading,
            viewport: self.viewport,
            implicit_wait_ms: self.implicit_wait_ms,
        }
    }
}

/// Field-level overrides for [`EngineConfig::with_overrides`].
#[derive(Debug, Default, Clone)]
pub struct EngineConfigOverrides {
    pub browser: Option<BrowserKind>,
    pub headless: Option<bool>,
    pub script_execution: Option<bool>,
    pub image_loading: Option<bool>,
    pub viewport: Option<Viewport>,
    pub implicit_wait_ms: Option<u64>,
    pub explicit_wait_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub retry_max_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub retry_backoff_factor: Option<Option<f64>>,
    pub retry_max_delay_ms: Option<u64>,
    pub screenshot_on_failure: Option<bool>,
    pub diagnostics_dir: Option<PathBuf>,
}

impl EngineConfigOverrides {
    pub fn browser(mut self, browser: BrowserKind) -> Self {
        self.browser = Some(browser);
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = Some(headless);
        self
    }
}

/// Errors that can arise while resolving an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum EngineConfigError {
    #[error("invalid value '{value}' for {field}")]
    InvalidEnumVariant { field: &'static str, value: String },
    #[error("invalid boolean '{value}' for {field}")]
    InvalidBool { field: &'static str, value: String },
    #[error("invalid number '{value}' for {field}: {source}")]
    InvalidNumber {
        field: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("invalid number '{value}' for {field}: {source}")]
    InvalidFloat {
        field: &'static str,
        value: String,
        #[source]
        source: ParseFloatError,
    },
    #[error("invalid viewport '{value}' for {field}; expected WIDTHxHEIGHT")]
    InvalidViewport { field: &'static str, value: String },
}

impl EngineConfigError {
    fn invalid_enum(field: &'static str, value: String) -> Self {
        EngineConfigError::InvalidEnumVariant { field, value }
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(field: &'static str, value: &str) -> Result<bool, EngineConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EngineConfigError::InvalidBool {
            field,
            value: value.to_string(),
        }),
    }
}

fn parse_u64(field: &'static str, value: &str) -> Result<u64, EngineConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|source| EngineConfigError::InvalidNumber {
            field,
            value: value.to_string(),
            source,
        })
}

fn parse_u32(field: &'static str, value: &str) -> Result<u32, EngineConfigError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|source| EngineConfigError::InvalidNumber {
            field,
            value: value.to_string(),
            source,
        })
}

fn parse_f64(field: &'static str, value: &str) -> Result<f64, EngineConfigError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|source| EngineConfigError::InvalidFloat {
            field,
            value: value.to_string(),
            source,
        })
}

fn parse_viewport(field: &'static str, value: &str) -> Result<Viewport, EngineConfigError> {
    let invalid = || EngineConfigError::InvalidViewport {
        field,
        value: value.to_string(),
    };
    let (width, height) = value.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
    Ok(Viewport {
        width: width.trim().parse::<u32>().map_err(|_| invalid())?,
        height: height.trim().parse::<u32>().map_err(|_| invalid())?,
    })
}
