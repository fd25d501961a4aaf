//! Explicit-wait condition evaluation.
//!
//! [`WaitEvaluator::until`] polls a [`WaitCondition`] at a fixed cadence
//! until it holds or the budget elapses. Polling blocks only the calling
//! worker; UI automation is serial per session, so there is nothing useful
//! to yield to. A poll that hits a recoverable error (element not yet in the
//! DOM, or replaced mid-render) counts as "not yet satisfied"; anything else
//! propagates immediately.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio::time::{sleep, Instant};

use crate::driver::{DriverError, DriverProtocol, FailureKind};
use crate::locator::{ElementHandle, Locator};
use crate::logging::TestLogger;

/// String predicate applied to an element's text.
#[derive(Debug, Clone)]
pub enum TextPredicate {
    Exact(String),
    Contains(String),
    Matches(Regex),
}

impl TextPredicate {
    pub fn evaluate(&self, text: &str) -> bool {
        match self {
            TextPredicate::Exact(expected) => text == expected,
            TextPredicate::Contains(needle) => text.contains(needle.as_str()),
            TextPredicate::Matches(pattern) => pattern.is_match(text),
        }
    }
}

impl fmt::Display for TextPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextPredicate::Exact(expected) => write!(f, "equals '{expected}'"),
            TextPredicate::Contains(needle) => write!(f, "contains '{needle}'"),
            TextPredicate::Matches(pattern) => write!(f, "matches /{pattern}/"),
        }
    }
}

/// Conditions the evaluator can poll for.
///
/// Every check tolerates the element disappearing between polls; an
/// intermediate DOM mutation counts as "not yet satisfied", not as an error.
#[derive(Debug, Clone)]
pub enum WaitCondition {
    /// Element is attached to the DOM.
    Present(Locator),
    /// Element is attached and displayed.
    Visible(Locator),
    /// Element is displayed and enabled for interaction.
    Clickable(Locator),
    /// Element is displayed and its text satisfies the predicate.
    TextSatisfies(Locator, TextPredicate),
}

impl WaitCondition {
    pub fn locator(&self) -> &Locator {
        match self {
            WaitCondition::Present(locator)
            | WaitCondition::Visible(locator)
            | WaitCondition::Clickable(locator)
            | WaitCondition::TextSatisfies(locator, _) => locator,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            WaitCondition::Present(locator) => format!("element {locator} present in DOM"),
            WaitCondition::Visible(locator) => format!("element {locator} visible"),
            WaitCondition::Clickable(locator) => format!("element {locator} clickable"),
            WaitCondition::TextSatisfies(locator, predicate) => {
                format!("text of element {locator} {predicate}")
            }
        }
    }

    /// One evaluation against live driver state. Multiple matches resolve to
    /// the first in document order; uniqueness is the call site's concern.
    pub(crate) async fn check(
        &self,
        driver: &dyn DriverProtocol,
        session_id: &str,
    ) -> Result<Option<ElementHandle>, DriverError> {
        let handles = driver.find_elements(session_id, self.locator()).await?;
        let handle = match handles.into_iter().next() {
            Some(handle) => handle,
            None => return Ok(None),
        };

        let satisfied = match self {
            WaitCondition::Present(_) => true,
            WaitCondition::Visible(_) => driver.is_displayed(&handle).await?,
            WaitCondition::Clickable(_) => {
                driver.is_displayed(&handle).await? && driver.is_enabled(&handle).await?
            }
            WaitCondition::TextSatisfies(_, predicate) => {
                driver.is_displayed(&handle).await?
                    && predicate.evaluate(&driver.get_text(&handle).await?)
            }
        };

        Ok(satisfied.then_some(handle))
    }
}

/// Error surfaced by [`WaitEvaluator::until`].
#[derive(Debug, Error)]
pub enum WaitError {
    /// The condition was actively polled for the full budget and never held.
    /// Distinct from "not found": the check ran the whole time.
    #[error("condition '{condition}' not satisfied within {elapsed:?}")]
    Timeout { condition: String, elapsed: Duration },
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Polls conditions against driver state until satisfied or timed out.
pub struct WaitEvaluator {
    driver: Arc<dyn DriverProtocol>,
    logger: Arc<TestLogger>,
}

impl WaitEvaluator {
    pub fn new(driver: Arc<dyn DriverProtocol>, logger: Arc<TestLogger>) -> Self {
        Self { driver, logger }
    }

    /// Repeatedly evaluates `condition` every `poll_interval` until it holds
    /// or `timeout` elapses. The satisfied handle is returned fresh from the
    /// final poll; it has not outlived any wait boundary.
    pub async fn until(
        &self,
        session_id: &str,
        condition: &WaitCondition,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<ElementHandle, WaitError> {
        let started = Instant::now();
        loop {
            match condition.check(self.driver.as_ref(), session_id).await {
                Ok(Some(handle)) => {
                    self.logger.debug(
                        format!(
                            "{} after {:?}",
                            condition.describe(),
                            started.elapsed()
                        ),
                        Some("wait"),
                        None,
                    );
                    return Ok(handle);
                }
                Ok(None) => {}
                Err(error) => match error.classification() {
                    // The element vanishing between polls is expected DOM
                    // churn, not a failure.
                    Some(FailureKind::NotFound) | Some(FailureKind::Stale) => {}
                    _ => return Err(WaitError::Driver(error)),
                },
            }

            if started.elapsed() >= timeout {
                return Err(WaitError::Timeout {
                    condition: condition.describe(),
                    elapsed: started.elapsed(),
                });
            }
            sleep(poll_interval).await;
        }
    }
}
