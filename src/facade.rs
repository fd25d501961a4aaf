//! Public interaction surface bound to one session.
//!
//! Each operation resolves its element fresh, acts on it, and retries the
//! whole resolution + action under the engine's policy, so a handle
//! invalidated by a re-render is re-queried rather than reused. When the
//! final attempt fails, a diagnostic record is captured synchronously before
//! the classified failure propagates: the artifact exists at the moment the
//! caller observes the error. Side effects are strictly scoped to the owning
//! session; no global state is touched.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::diagnostics::DiagnosticRecorder;
use crate::driver::{DriverError, DriverProtocol};
use crate::element::{exhausted_to_engine_error, ElementLocator};
use crate::error::EngineError;
use crate::locator::{ElementHandle, Locator};
use crate::logging::TestLogger;
use crate::retry::RetryExecutor;
use crate::session::Session;
use crate::wait::WaitCondition;

/// Click, type, read, and probe operations against one browser session.
pub struct InteractionFacade {
    driver: Arc<dyn DriverProtocol>,
    session: Session,
    elements: ElementLocator,
    retries: RetryExecutor,
    recorder: DiagnosticRecorder,
    logger: Arc<TestLogger>,
    explicit_wait: Duration,
}

impl InteractionFacade {
    pub fn new(
        driver: Arc<dyn DriverProtocol>,
        session: Session,
        config: &EngineConfig,
        logger: Arc<TestLogger>,
    ) -> Self {
        let policy = config.retry_policy();
        let elements = ElementLocator::new(
            Arc::clone(&driver),
            policy.clone(),
            config.poll_interval(),
            Arc::clone(&logger),
        );
        let retries = RetryExecutor::new(policy, Arc::clone(&logger));
        let recorder = DiagnosticRecorder::new(
            Arc::clone(&driver),
            config.diagnostics_dir.clone(),
            config.screenshot_on_failure,
            Arc::clone(&logger),
        );

        Self {
            driver,
            session,
            elements,
            retries,
            recorder,
            logger,
            explicit_wait: config.explicit_wait(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn elements(&self) -> &ElementLocator {
        &self.elements
    }

    /// Clicks the first element matching `locator` once it is clickable.
    pub async fn click(&self, locator: &Locator) -> Result<(), EngineError> {
        self.perform(
            "click",
            locator,
            WaitCondition::Clickable(locator.clone()),
            |driver, handle| async move { driver.click(&handle).await },
        )
        .await?;
        self.logger
            .debug(format!("clicked element {locator}"), Some("interaction"), None);
        Ok(())
    }

    /// Clears the element and types `text` into it once it is visible.
    pub async fn type_text(&self, locator: &Locator, text: &str) -> Result<(), EngineError> {
        let value = text.to_string();
        self.perform(
            "type",
            locator,
            WaitCondition::Visible(locator.clone()),
            move |driver, handle| {
                let value = value.clone();
                async move {
                    driver.clear(&handle).await?;
                    driver.send_keys(&handle, &value).await
                }
            },
        )
        .await?;
        self.logger
            .debug(format!("typed into element {locator}"), Some("interaction"), None);
        Ok(())
    }

    /// Reads the visible text of the first element matching `locator`.
    pub async fn read_text(&self, locator: &Locator) -> Result<String, EngineError> {
        let text = self
            .perform(
                "read-text",
                locator,
                WaitCondition::Visible(locator.clone()),
                |driver, handle| async move { driver.get_text(&handle).await },
            )
            .await?;
        self.logger.debug(
            format!("read text '{text}' from element {locator}"),
            Some("interaction"),
            None,
        );
        Ok(text)
    }

    /// Non-failing probe: true if the element becomes visible within
    /// `timeout`, false otherwise. Meant for conditional logic, not
    /// assertions, so a timeout is an answer rather than an error and no
    /// diagnostic is captured.
    pub async fn is_visible(&self, locator: &Locator, timeout: Duration) -> bool {
        let condition = WaitCondition::Visible(locator.clone());
        self.elements
            .attempt(&self.session, &condition, timeout)
            .await
            .is_ok()
    }

    /// Non-failing probe: true if the element is attached to the DOM within
    /// `timeout`.
    pub async fn is_present(&self, locator: &Locator, timeout: Duration) -> bool {
        let condition = WaitCondition::Present(locator.clone());
        self.elements
            .attempt(&self.session, &condition, timeout)
            .await
            .is_ok()
    }

    /// Resolution + action under retry, with diagnostic capture on terminal
    /// failure. Capture happens once per terminal failure, never once per
    /// attempt.
    async fn perform<T, A, Fut>(
        &self,
        operation: &str,
        locator: &Locator,
        condition: WaitCondition,
        action: A,
    ) -> Result<T, EngineError>
    where
        A: Fn(Arc<dyn DriverProtocol>, ElementHandle) -> Fut,
        Fut: Future<Output = Result<T, DriverError>>,
    {
        let outcome = self
            .retries
            .execute(operation, || async {
                let handle = self
                    .elements
                    .attempt(&self.session, &condition, self.explicit_wait)
                    .await?;
                action(Arc::clone(&self.driver), handle).await
            })
            .await;

        match outcome {
            Ok(value) => Ok(value),
            Err(failure) => {
                let error = exhausted_to_engine_error(locator, failure, self.explicit_wait);
                self.recorder
                    .capture(self.session.id(), operation, &format!("{locator}: {error}"))
                    .await;
                Err(error)
            }
        }
    }
}
