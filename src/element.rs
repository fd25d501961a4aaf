//! Logical locator resolution with staleness recovery.
//!
//! Resolution always starts from the locator, never from a previously held
//! handle: a wait pass re-queries the DOM from scratch, so a re-render
//! between operations costs one extra lookup instead of a dangling
//! reference. When a wait pass fails transiently, the retry layer runs a
//! fresh pass under the engine's policy.

use std::sync::Arc;
use std::time::Duration;

use crate::driver::{DriverError, DriverProtocol, FailureKind};
use crate::error::EngineError;
use crate::locator::{ElementHandle, Locator};
use crate::logging::TestLogger;
use crate::retry::{RetryExecutor, RetryFailure, RetryPolicy};
use crate::session::Session;
use crate::wait::{WaitCondition, WaitError, WaitEvaluator};

/// Resolves logical locators to live element handles.
pub struct ElementLocator {
    waits: WaitEvaluator,
    retries: RetryExecutor,
    poll_interval: Duration,
}

impl ElementLocator {
    pub fn new(
        driver: Arc<dyn DriverProtocol>,
        policy: RetryPolicy,
        poll_interval: Duration,
        logger: Arc<TestLogger>,
    ) -> Self {
        Self {
            waits: WaitEvaluator::new(driver, Arc::clone(&logger)),
            retries: RetryExecutor::new(policy, logger),
            poll_interval,
        }
    }

    pub fn wait_evaluator(&self) -> &WaitEvaluator {
        &self.waits
    }

    /// One wait pass for `condition`, classified for retry gating: a wait
    /// that times out reports the classification the condition implies (an
    /// element that never turned up is not-found; one that never became
    /// clickable is intercepted).
    pub(crate) async fn attempt(
        &self,
        session: &Session,
        condition: &WaitCondition,
        timeout: Duration,
    ) -> Result<ElementHandle, DriverError> {
        match self
            .waits
            .until(session.id(), condition, timeout, self.poll_interval)
            .await
        {
            Ok(handle) => Ok(handle),
            Err(WaitError::Timeout {
                condition: description,
                ..
            }) => Err(timeout_failure(condition, description)),
            Err(WaitError::Driver(error)) => Err(error),
        }
    }

    /// Resolves `locator` to a live handle, waiting for it to become visible
    /// and retrying transient failures under the engine's policy.
    ///
    /// If several nodes match, the first in document order is returned;
    /// guaranteeing uniqueness is the page object's responsibility.
    pub async fn resolve(
        &self,
        session: &Session,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementHandle, EngineError> {
        let condition = WaitCondition::Visible(locator.clone());
        let outcome = self
            .retries
            .execute("resolve", || self.attempt(session, &condition, timeout))
            .await;

        outcome.map_err(|failure| exhausted_to_engine_error(locator, failure, timeout))
    }
}

/// A wait that timed out reports the classification its condition implies:
/// an element that never turned up is not-found, one that never became
/// clickable is intercepted, a text predicate that never held is a plain
/// timeout.
fn timeout_failure(condition: &WaitCondition, description: String) -> DriverError {
    match condition {
        WaitCondition::Present(_) | WaitCondition::Visible(_) => DriverError::NoSuchElement {
            locator: description,
        },
        WaitCondition::Clickable(_) => DriverError::ClickIntercepted {
            message: description,
        },
        WaitCondition::TextSatisfies(..) => DriverError::Timeout {
            message: description,
        },
    }
}

/// Maps an exhausted retry to the public taxonomy, keeping the last driver
/// failure as the cause.
pub(crate) fn exhausted_to_engine_error(
    locator: &Locator,
    failure: RetryFailure,
    timeout: Duration,
) -> EngineError {
    let RetryFailure {
        attempts, error, ..
    } = failure;
    match error.classification() {
        Some(FailureKind::NotFound) => EngineError::ElementNotFound {
            locator: locator.clone(),
            attempts,
            source: error,
        },
        Some(kind @ (FailureKind::Stale | FailureKind::Intercepted)) => {
            EngineError::ElementNotInteractable {
                locator: locator.clone(),
                attempts,
                kind,
                source: error,
            }
        }
        Some(FailureKind::SessionDead) => EngineError::SessionDead { source: error },
        Some(FailureKind::TimedOut) => EngineError::WaitTimeout {
            condition: error.to_string(),
            elapsed: timeout,
        },
        None => EngineError::Driver(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::config::EngineConfig;
    use crate::driver::SessionCapabilities;
    use crate::logging::LogLevel;
    use crate::session::SessionManager;

    /// Driver whose find results are scripted per call.
    struct FlakyDriver {
        finds: Mutex<VecDeque<Result<Vec<&'static str>, DriverError>>>,
    }

    impl FlakyDriver {
        fn new(finds: Vec<Result<Vec<&'static str>, DriverError>>) -> Arc<Self> {
            Arc::new(Self {
                finds: Mutex::new(finds.into()),
            })
        }
    }

    #[async_trait]
    impl DriverProtocol for FlakyDriver {
        async fn new_session(
            &self,
            _capabilities: &SessionCapabilities,
        ) -> Result<String, DriverError> {
            Ok("s-1".into())
        }

        async fn find_elements(
            &self,
            session_id: &str,
            _locator: &Locator,
        ) -> Result<Vec<ElementHandle>, DriverError> {
            match self.finds.lock().unwrap().pop_front() {
                Some(Ok(ids)) => Ok(ids
                    .into_iter()
                    .map(|id| ElementHandle::new(id, session_id))
                    .collect()),
                Some(Err(error)) => Err(error),
                None => Ok(vec![]),
            }
        }

        async fn is_displayed(&self, _handle: &ElementHandle) -> Result<bool, DriverError> {
            Ok(true)
        }

        async fn is_enabled(&self, _handle: &ElementHandle) -> Result<bool, DriverError> {
            Ok(true)
        }

        async fn click(&self, _handle: &ElementHandle) -> Result<(), DriverError> {
            Ok(())
        }

        async fn clear(&self, _handle: &ElementHandle) -> Result<(), DriverError> {
            Ok(())
        }

        async fn send_keys(
            &self,
            _handle: &ElementHandle,
            _text: &str,
        ) -> Result<(), DriverError> {
            Ok(())
        }

        async fn get_text(&self, _handle: &ElementHandle) -> Result<String, DriverError> {
            Ok(String::new())
        }

        async fn take_screenshot(&self, _session_id: &str) -> Result<Vec<u8>, DriverError> {
            Ok(vec![])
        }

        async fn quit(&self, _session_id: &str) -> Result<(), DriverError> {
            Ok(())
        }
    }

    fn quiet_logger() -> Arc<TestLogger> {
        let mut logger = TestLogger::new(LogLevel::Debug);
        logger.set_sink(Some(Arc::new(|_| {})));
        Arc::new(logger)
    }

    async fn session_for(driver: Arc<dyn DriverProtocol>) -> Session {
        SessionManager::new(driver, quiet_logger())
            .acquire(&EngineConfig::default())
            .await
            .expect("session")
    }

    fn locator_with(driver: Arc<dyn DriverProtocol>, attempts: u32) -> ElementLocator {
        ElementLocator::new(
            driver,
            RetryPolicy::new(attempts, Duration::ZERO),
            Duration::from_millis(5),
            quiet_logger(),
        )
    }

    #[tokio::test]
    async fn first_match_in_document_order_wins() {
        let driver = FlakyDriver::new(vec![Ok(vec!["el-a", "el-b", "el-c"])]);
        let session = session_for(driver.clone()).await;
        let locator = locator_with(driver, 1);

        let handle = locator
            .resolve(&session, &Locator::class_name("row"), Duration::from_millis(50))
            .await
            .expect("resolve");
        assert_eq!(handle.element_id, "el-a");
    }

    #[tokio::test]
    async fn stale_results_are_requeried_rather_than_reused() {
        // First pass dies stale, second pass finds a fresh node.
        let driver = FlakyDriver::new(vec![
            Err(DriverError::StaleElement),
            Ok(vec!["el-fresh"]),
        ]);
        let session = session_for(driver.clone()).await;
        let locator = locator_with(driver, 3);

        let handle = locator
            .resolve(&session, &Locator::id("rerendered"), Duration::from_millis(50))
            .await
            .expect("second pass succeeds");
        assert_eq!(handle.element_id, "el-fresh");
    }

    #[tokio::test]
    async fn exhaustion_maps_to_element_not_found() {
        let driver = FlakyDriver::new(vec![]);
        let session = session_for(driver.clone()).await;
        let locator = locator_with(driver, 2);

        let error = locator
            .resolve(&session, &Locator::id("missing"), Duration::from_millis(20))
            .await
            .expect_err("never appears");

        match error {
            EngineError::ElementNotFound {
                locator, attempts, ..
            } => {
                assert_eq!(locator, Locator::id("missing"));
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn session_death_during_resolution_is_not_retried() {
        let driver = FlakyDriver::new(vec![Err(DriverError::SessionDead {
            session_id: "s-1".into(),
        })]);
        let session = session_for(driver.clone()).await;
        let locator = locator_with(driver.clone(), 5);

        let error = locator
            .resolve(&session, &Locator::id("any"), Duration::from_secs(1))
            .await
            .expect_err("dead session");

        assert!(matches!(error, EngineError::SessionDead { .. }));
        // The remaining scripted entries were never consumed.
        assert!(driver.finds.lock().unwrap().is_empty());
    }
}
