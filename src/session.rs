//! Browser session lifecycle.
//!
//! Each concurrent worker owns exactly one [`Session`] for its lifetime;
//! sessions are never shared or pooled, which is what keeps parallel runs
//! free of cross-talk without any synchronisation between workers.
//! [`SessionManager::with_session`] is the scoped form: acquire, run the
//! worker's unit of work, release on every exit path.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;

use crate::config::EngineConfig;
use crate::driver::{DriverProtocol, SessionCapabilities};
use crate::error::EngineError;
use crate::logging::TestLogger;

/// One live browser instance, owned exclusively by a single worker.
///
/// Cloning shares the same underlying session; the clone is a handle, not a
/// second browser.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    id: String,
    capabilities: SessionCapabilities,
    released: AtomicBool,
}

impl Session {
    fn new(id: String, capabilities: SessionCapabilities) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id,
                capabilities,
                released: AtomicBool::new(false),
            }),
        }
    }

    /// Driver-issued session identifier, used to namespace diagnostics.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn capabilities(&self) -> &SessionCapabilities {
        &self.inner.capabilities
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }

    /// Returns true only for the call that performed the transition.
    fn mark_released(&self) -> bool {
        !self.inner.released.swap(true, Ordering::SeqCst)
    }
}

/// Creates and tears down browser sessions against the driver protocol.
pub struct SessionManager {
    driver: Arc<dyn DriverProtocol>,
    logger: Arc<TestLogger>,
}

impl SessionManager {
    pub fn new(driver: Arc<dyn DriverProtocol>, logger: Arc<TestLogger>) -> Self {
        Self { driver, logger }
    }

    /// Opens a new browser session from the resolved configuration.
    ///
    /// Creation failures are fatal for the worker and are not retried here:
    /// a driver that cannot start (binary missing, port conflict,
    /// incompatible version) signals an environment problem, not transient
    /// flakiness, and session creation is too expensive to spin on.
    pub async fn acquire(&self, config: &EngineConfig) -> Result<Session, EngineError> {
        let capabilities = config.capabilities();
        let id = self
            .driver
            .new_session(&capabilities)
            .await
            .map_err(|source| EngineError::SessionCreation { source })?;

        self.logger.info(
            format!("browser session {id} created"),
            Some("session"),
            Some(json!({
                "browser": capabilities.browser.as_str(),
                "headless": capabilities.headless,
            })),
        );

        Ok(Session::new(id, capabilities))
    }

    /// Best-effort teardown. Never fails and is safe to call more than
    /// once; a test's pass/fail outcome must not be overwritten by a
    /// cleanup failure, so teardown errors are logged and dropped.
    pub async fn release(&self, session: &Session) {
        if !session.mark_released() {
            return;
        }

        match self.driver.quit(session.id()).await {
            Ok(()) => {
                self.logger.info(
                    format!("browser session {} closed", session.id()),
                    Some("session"),
                    None,
                );
            }
            Err(error) => {
                self.logger.warn(
                    format!("teardown of session {} failed: {error}", session.id()),
                    Some("session"),
                    None,
                );
            }
        }
    }

    /// Runs `work` with a freshly acquired session, releasing it on every
    /// exit path. If acquisition itself fails, `work` never runs and no
    /// release is attempted against a session that does not exist.
    pub async fn with_session<T, F, Fut>(
        &self,
        config: &EngineConfig,
        work: F,
    ) -> Result<T, EngineError>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let session = self.acquire(config).await?;
        let result = work(session.clone()).await;
        self.release(&session).await;
        result
    }
}
