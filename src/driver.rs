//! Driver protocol abstraction.
//!
//! The engine never talks to a browser directly; it issues commands through
//! [`DriverProtocol`], an object-safe async trait a concrete binding (a
//! WebDriver wire client, a CDP client, an in-memory fake in tests)
//! implements. Every fallible driver operation surfaces a [`DriverError`],
//! which classifies itself into a [`FailureKind`] so retry and wait layers
//! can decide what is transient and what is terminal.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{BrowserKind, Viewport};
use crate::locator::{ElementHandle, Locator};

/// Classification of a failed driver operation. Determines retry eligibility
/// and how an exhausted failure is reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// No node matched the locator.
    NotFound,
    /// A previously resolved handle no longer points at a live node.
    Stale,
    /// A wait or driver call exhausted its time budget.
    TimedOut,
    /// Another element intercepted the interaction (overlay, animation).
    Intercepted,
    /// The session terminated; retrying against it only wastes the budget.
    SessionDead,
}

/// Error surfaced by a driver binding.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("no element matched {locator}")]
    NoSuchElement { locator: String },
    #[error("element reference is stale")]
    StaleElement,
    #[error("interaction intercepted: {message}")]
    ClickIntercepted { message: String },
    #[error("driver operation timed out: {message}")]
    Timeout { message: String },
    #[error("session could not be created: {message}")]
    SessionNotCreated { message: String },
    #[error("session {session_id} is no longer alive")]
    SessionDead { session_id: String },
    #[error("driver protocol error: {0}")]
    Protocol(String),
}

impl DriverError {
    /// Classification of this failure, if it maps onto one of the known
    /// categories. Unclassified errors are never retried.
    pub fn classification(&self) -> Option<FailureKind> {
        match self {
            DriverError::NoSuchElement { .. } => Some(FailureKind::NotFound),
            DriverError::StaleElement => Some(FailureKind::Stale),
            DriverError::ClickIntercepted { .. } => Some(FailureKind::Intercepted),
            DriverError::Timeout { .. } => Some(FailureKind::TimedOut),
            DriverError::SessionDead { .. } => Some(FailureKind::SessionDead),
            DriverError::SessionNotCreated { .. } | DriverError::Protocol(_) => None,
        }
    }
}

/// Pre-resolved session parameters handed to the driver when opening a
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCapabilities {
    pub browser: BrowserKind,
    pub headless: bool,
    /// Whether page script execution is enabled for the session.
    pub script_execution: bool,
    /// Whether the browser loads images.
    pub image_loading: bool,
    pub viewport: Viewport,
    /// Driver-side implicit wait applied to element lookups, in milliseconds.
    pub implicit_wait_ms: u64,
}

/// Commands the engine issues against a remote browser-automation driver.
///
/// `find_elements` returns matches in document order. Handle-taking
/// operations fail with [`DriverError::StaleElement`] when the underlying
/// node has been replaced, and with [`DriverError::SessionDead`] when the
/// owning session has terminated.
#[async_trait]
pub trait DriverProtocol: Send + Sync {
    /// Opens a browser session and returns its driver-issued identifier.
    async fn new_session(
        &self,
        capabilities: &SessionCapabilities,
    ) -> Result<String, DriverError>;

    async fn find_elements(
        &self,
        session_id: &str,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, DriverError>;

    async fn is_displayed(&self, handle: &ElementHandle) -> Result<bool, DriverError>;

    async fn is_enabled(&self, handle: &ElementHandle) -> Result<bool, DriverError>;

    async fn click(&self, handle: &ElementHandle) -> Result<(), DriverError>;

    async fn clear(&self, handle: &ElementHandle) -> Result<(), DriverError>;

    async fn send_keys(&self, handle: &ElementHandle, text: &str) -> Result<(), DriverError>;

    async fn get_text(&self, handle: &ElementHandle) -> Result<String, DriverError>;

    /// Captures a full-page screenshot as PNG bytes.
    async fn take_screenshot(&self, session_id: &str) -> Result<Vec<u8>, DriverError>;

    /// Terminates the session. Implementations should make this safe to call
    /// on an already-terminated session.
    async fn quit(&self, session_id: &str) -> Result<(), DriverError>;
}
