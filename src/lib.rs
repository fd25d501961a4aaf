//! Steadfast — a resilient browser interaction engine for UI test
//! automation.
//!
//! The engine issues commands against a remote browser-automation driver and
//! absorbs the flakiness inherent to DOM timing: elements that have not
//! rendered yet, handles invalidated by a re-render, interactions
//! intercepted by overlays. It is built from a few small pieces:
//!
//! - [`SessionManager`] owns one browser session per concurrent worker, with
//!   guaranteed, idempotent teardown.
//! - [`WaitEvaluator`] polls [`WaitCondition`]s against driver state until
//!   satisfied or timed out.
//! - [`RetryExecutor`] runs fallible operations under a [`RetryPolicy`],
//!   retrying only classifications the policy marks transient.
//! - [`ElementLocator`] resolves logical [`Locator`]s to live handles,
//!   re-querying from scratch instead of reusing anything stale.
//! - [`InteractionFacade`] is the public surface (click, type, read text,
//!   visibility probes); on terminal failure it captures a diagnostic via
//!   [`DiagnosticRecorder`] before the classified error propagates.
//!
//! The concrete browser binding is not part of this crate: the engine
//! depends only on the [`DriverProtocol`] trait, which a WebDriver or CDP
//! client (or an in-memory fake, in tests) implements.

pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod element;
pub mod error;
pub mod facade;
pub mod locator;
pub mod logging;
pub mod retry;
pub mod session;
pub mod wait;

pub use config::{BrowserKind, EngineConfig, EngineConfigError, EngineConfigOverrides, Viewport};
pub use diagnostics::{DiagnosticRecord, DiagnosticRecorder};
pub use driver::{DriverError, DriverProtocol, FailureKind, SessionCapabilities};
pub use element::ElementLocator;
pub use error::EngineError;
pub use facade::InteractionFacade;
pub use locator::{ElementHandle, Locator, Strategy};
pub use logging::{LogConfig, LogLevel, LogSink, TestLogRecord, TestLogger};
pub use retry::{RetryExecutor, RetryFailure, RetryPolicy};
pub use session::{Session, SessionManager};
pub use wait::{TextPredicate, WaitCondition, WaitError, WaitEvaluator};
