//! Failure taxonomy surfaced by the engine's public operations.

use std::time::Duration;

use thiserror::Error;

use crate::driver::{DriverError, FailureKind};
use crate::locator::Locator;
use crate::wait::WaitError;

/// Classified failures the engine propagates to its callers.
///
/// Transient classifications are retried internally up to the configured
/// policy; whatever reaches the caller is terminal and carries the original
/// cause, the locator or condition context, and the attempt count where one
/// applies. Every propagated failure of a facade operation is accompanied by
/// exactly one diagnostic record.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The driver could not start a browser session. Fatal for the worker;
    /// never retried here, since a repeated creation failure points at the
    /// environment rather than DOM flakiness.
    #[error("failed to create browser session")]
    SessionCreation {
        #[source]
        source: DriverError,
    },

    /// A condition was actively polled for the full budget and never held.
    #[error("condition '{condition}' not satisfied within {elapsed:?}")]
    WaitTimeout { condition: String, elapsed: Duration },

    /// The element never appeared; retries exhausted.
    #[error("element {locator} not found after {attempts} attempt(s)")]
    ElementNotFound {
        locator: Locator,
        attempts: u32,
        #[source]
        source: DriverError,
    },

    /// The element existed but stayed stale or intercepted past the final
    /// attempt.
    #[error("element {locator} not interactable after {attempts} attempt(s)")]
    ElementNotInteractable {
        locator: Locator,
        attempts: u32,
        kind: FailureKind,
        #[source]
        source: DriverError,
    },

    /// The session terminated mid-operation. Never retried.
    #[error("session terminated mid-operation")]
    SessionDead {
        #[source]
        source: DriverError,
    },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl EngineError {
    /// The failure classification this error reports, if any.
    pub fn classification(&self) -> Option<FailureKind> {
        match self {
            EngineError::SessionCreation { .. } => None,
            EngineError::WaitTimeout { .. } => Some(FailureKind::TimedOut),
            EngineError::ElementNotFound { .. } => Some(FailureKind::NotFound),
            EngineError::ElementNotInteractable { kind, .. } => Some(*kind),
            EngineError::SessionDead { .. } => Some(FailureKind::SessionDead),
            EngineError::Driver(source) => source.classification(),
        }
    }
}

impl From<WaitError> for EngineError {
    fn from(error: WaitError) -> Self {
        match error {
            WaitError::Timeout { condition, elapsed } => {
                EngineError::WaitTimeout { condition, elapsed }
            }
            WaitError::Driver(source) => match source.classification() {
                Some(FailureKind::SessionDead) => EngineError::SessionDead { source },
                _ => EngineError::Driver(source),
            },
        }
    }
}
