//! End-to-end engine tests against a scripted in-memory driver.
//!
//! The fake driver tags every handle with the session it belongs to and
//! records every call, which lets these tests assert the engine's contract
//! from the outside: attempt counts, diagnostic cadence, teardown
//! guarantees, and session isolation across concurrent workers.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;

use steadfast::{
    DriverError, DriverProtocol, ElementHandle, EngineConfig, EngineError, InteractionFacade,
    Locator, LogLevel, LogSink, SessionCapabilities, SessionManager, TestLogRecord, TestLogger,
    TextPredicate, WaitCondition, WaitEvaluator,
};

#[derive(Default)]
struct FakeState {
    next_session: u32,
    live: HashSet<String>,
    quits: Vec<String>,
    ops: Vec<(String, String)>,
    cross_session_violations: u32,
    screenshots: HashMap<String, u32>,
    missing_locators: HashSet<String>,
    click_script: VecDeque<Result<(), DriverError>>,
    text_script: VecDeque<String>,
}

/// In-memory driver. Every locator resolves to one visible, enabled element
/// owned by the querying session unless the locator is scripted as missing.
#[derive(Default)]
struct FakeDriver {
    fail_creation: bool,
    state: Mutex<FakeState>,
}

impl FakeDriver {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn failing_creation() -> Arc<Self> {
        Arc::new(Self {
            fail_creation: true,
            ..Self::default()
        })
    }

    fn mark_missing(&self, locator: &Locator) {
        self.state
            .lock()
            .unwrap()
            .missing_locators
            .insert(locator.value.clone());
    }

    fn script_clicks(&self, outcomes: Vec<Result<(), DriverError>>) {
        self.state.lock().unwrap().click_script = outcomes.into();
    }

    fn script_texts(&self, texts: Vec<&str>) {
        self.state.lock().unwrap().text_script =
            texts.into_iter().map(str::to_string).collect();
    }

    fn op_count(&self, session_id: &str, op: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .ops
            .iter()
            .filter(|(s, o)| s == session_id && o == op)
            .count()
    }

    fn violations(&self) -> u32 {
        self.state.lock().unwrap().cross_session_violations
    }

    fn quits(&self) -> Vec<String> {
        self.state.lock().unwrap().quits.clone()
    }

    fn screenshots_for(&self, session_id: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .screenshots
            .get(session_id)
            .copied()
            .unwrap_or(0)
    }

    /// Records the call, then validates the handle against the owning
    /// session.
    fn check_handle(&self, state: &mut FakeState, handle: &ElementHandle, op: &str) -> Result<(), DriverError> {
        state
            .ops
            .push((handle.session_id.clone(), op.to_string()));
        if !state.live.contains(&handle.session_id) {
            return Err(DriverError::SessionDead {
                session_id: handle.session_id.clone(),
            });
        }
        if !handle.element_id.starts_with(&handle.session_id) {
            state.cross_session_violations += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl DriverProtocol for FakeDriver {
    async fn new_session(
        &self,
        _capabilities: &SessionCapabilities,
    ) -> Result<String, DriverError> {
        if self.fail_creation {
            return Err(DriverError::SessionNotCreated {
                message: "chromedriver binary not found".into(),
            });
        }
        let mut state = self.state.lock().unwrap();
        state.next_session += 1;
        let id = format!("session-{}", state.next_session);
        state.live.insert(id.clone());
        Ok(id)
    }

    async fn find_elements(
        &self,
        session_id: &str,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        let mut state = self.state.lock().unwrap();
        state
            .ops
            .push((session_id.to_string(), "find".to_string()));
        if !state.live.contains(session_id) {
            return Err(DriverError::SessionDead {
                session_id: session_id.to_string(),
            });
        }
        if state.missing_locators.contains(&locator.value) {
            return Ok(vec![]);
        }
        Ok(vec![ElementHandle::new(
            format!("{session_id}/{}", locator.value),
            session_id,
        )])
    }

    async fn is_displayed(&self, handle: &ElementHandle) -> Result<bool, DriverError> {
        let mut state = self.state.lock().unwrap();
        self.check_handle(&mut state, handle, "is_displayed")?;
        Ok(true)
    }

    async fn is_enabled(&self, handle: &ElementHandle) -> Result<bool, DriverError> {
        let mut state = self.state.lock().unwrap();
        self.check_handle(&mut state, handle, "is_enabled")?;
        Ok(true)
    }

    async fn click(&self, handle: &ElementHandle) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        self.check_handle(&mut state, handle, "click")?;
        state.click_script.pop_front().unwrap_or(Ok(()))
    }

    async fn clear(&self, handle: &ElementHandle) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        self.check_handle(&mut state, handle, "clear")
    }

    async fn send_keys(&self, handle: &ElementHandle, _text: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        self.check_handle(&mut state, handle, "send_keys")
    }

    async fn get_text(&self, handle: &ElementHandle) -> Result<String, DriverError> {
        let mut state = self.state.lock().unwrap();
        self.check_handle(&mut state, handle, "get_text")?;
        if let Some(text) = state.text_script.pop_front() {
            return Ok(text);
        }
        // Elements echo their owning session, so workers can verify they
        // only ever read their own session's DOM.
        Ok(handle.session_id.clone())
    }

    async fn take_screenshot(&self, session_id: &str) -> Result<Vec<u8>, DriverError> {
        let mut state = self.state.lock().unwrap();
        *state.screenshots.entry(session_id.to_string()).or_insert(0) += 1;
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn quit(&self, session_id: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.live.remove(session_id);
        state.quits.push(session_id.to_string());
        Ok(())
    }
}

fn quiet_logger() -> Arc<TestLogger> {
    let mut logger = TestLogger::new(LogLevel::Debug);
    logger.set_sink(Some(Arc::new(|_| {})));
    Arc::new(logger)
}

fn capture_logger() -> (Arc<TestLogger>, Arc<Mutex<Vec<TestLogRecord>>>) {
    let records = Arc::new(Mutex::new(Vec::new()));
    let capture = Arc::clone(&records);
    let sink: LogSink = Arc::new(move |record| {
        capture.lock().unwrap().push(record.clone());
    });
    let mut logger = TestLogger::new(LogLevel::Debug);
    logger.set_sink(Some(sink));
    (Arc::new(logger), records)
}

fn fast_config(dir: &std::path::Path) -> EngineConfig {
    EngineConfig {
        explicit_wait_ms: 100,
        poll_interval_ms: 10,
        retry_max_attempts: 3,
        retry_delay_ms: 0,
        retry_backoff_factor: None,
        diagnostics_dir: dir.to_path_buf(),
        ..EngineConfig::default()
    }
}

#[tokio::test]
async fn deterministic_click_failure_runs_exactly_policy_attempts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let driver = FakeDriver::new();
    let intercepted = || {
        Err(DriverError::ClickIntercepted {
            message: "cookie banner".into(),
        })
    };
    driver.script_clicks(vec![intercepted(), intercepted(), intercepted(), intercepted()]);

    let config = fast_config(dir.path());
    let logger = quiet_logger();
    let manager = SessionManager::new(
        Arc::clone(&driver) as Arc<dyn DriverProtocol>,
        Arc::clone(&logger),
    );
    let session = manager.acquire(&config).await.expect("session");
    let facade = InteractionFacade::new(
        Arc::clone(&driver) as Arc<dyn DriverProtocol>,
        session.clone(),
        &config,
        logger,
    );

    let error = facade
        .click(&Locator::id("submit-btn"))
        .await
        .expect_err("all attempts intercepted");

    match error {
        EngineError::ElementNotInteractable { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(driver.op_count(session.id(), "click"), 3);
    manager.release(&session).await;
}

#[tokio::test]
async fn transient_failures_recover_and_log_three_attempts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let driver = FakeDriver::new();
    let intercepted = || {
        Err(DriverError::ClickIntercepted {
            message: "toast".into(),
        })
    };
    driver.script_clicks(vec![intercepted(), intercepted(), Ok(())]);

    let config = fast_config(dir.path());
    let (logger, records) = capture_logger();
    let manager = SessionManager::new(
        Arc::clone(&driver) as Arc<dyn DriverProtocol>,
        Arc::clone(&logger),
    );
    let session = manager.acquire(&config).await.expect("session");
    let facade = InteractionFacade::new(
        Arc::clone(&driver) as Arc<dyn DriverProtocol>,
        session.clone(),
        &config,
        logger,
    );

    facade
        .click(&Locator::id("save"))
        .await
        .expect("third attempt lands");

    assert_eq!(driver.op_count(session.id(), "click"), 3);
    let attempt_logs = records
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.level == LogLevel::Debug && r.message.contains("/3 for click"))
        .count();
    assert_eq!(attempt_logs, 3);
    // The run recovered, so the diagnostic sink stays empty.
    assert_eq!(driver.screenshots_for(session.id()), 0);
    manager.release(&session).await;
}

#[tokio::test]
async fn terminal_failure_produces_exactly_one_diagnostic() {
    let dir = tempfile::tempdir().expect("tempdir");
    let driver = FakeDriver::new();
    driver.mark_missing(&Locator::id("ghost"));

    let config = fast_config(dir.path());
    let logger = quiet_logger();
    let manager = SessionManager::new(
        Arc::clone(&driver) as Arc<dyn DriverProtocol>,
        Arc::clone(&logger),
    );
    let session = manager.acquire(&config).await.expect("session");
    let facade = InteractionFacade::new(
        Arc::clone(&driver) as Arc<dyn DriverProtocol>,
        session.clone(),
        &config,
        logger,
    );

    let error = facade
        .read_text(&Locator::id("ghost"))
        .await
        .expect_err("never appears");
    assert!(matches!(error, EngineError::ElementNotFound { .. }));

    assert_eq!(driver.screenshots_for(session.id()), 1);
    let mut pngs = 0;
    let mut sidecars = 0;
    for entry in std::fs::read_dir(dir.path()).expect("read dir") {
        let path = entry.expect("entry").path();
        match path.extension().and_then(|e| e.to_str()) {
            Some("png") => pngs += 1,
            Some("json") => sidecars += 1,
            _ => {}
        }
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(&format!("{}_read-text_", session.id())));
    }
    assert_eq!(pngs, 1);
    assert_eq!(sidecars, 1);
    manager.release(&session).await;
}

#[tokio::test]
async fn visibility_probe_returns_false_in_roughly_the_budget() {
    let dir = tempfile::tempdir().expect("tempdir");
    let driver = FakeDriver::new();
    driver.mark_missing(&Locator::id("spinner"));

    let config = fast_config(dir.path());
    let logger = quiet_logger();
    let manager = SessionManager::new(
        Arc::clone(&driver) as Arc<dyn DriverProtocol>,
        Arc::clone(&logger),
    );
    let session = manager.acquire(&config).await.expect("session");
    let facade = InteractionFacade::new(
        Arc::clone(&driver) as Arc<dyn DriverProtocol>,
        session,
        &config,
        logger,
    );

    let budget = Duration::from_millis(200);
    let started = Instant::now();
    let visible = facade.is_visible(&Locator::id("spinner"), budget).await;
    let elapsed = started.elapsed();

    assert!(!visible);
    assert!(elapsed >= budget);
    assert!(elapsed < budget + Duration::from_millis(300));
}

#[tokio::test]
async fn session_creation_failure_surfaces_without_release() {
    let driver = FakeDriver::failing_creation();
    let logger = quiet_logger();
    let manager = SessionManager::new(
        Arc::clone(&driver) as Arc<dyn DriverProtocol>,
        logger,
    );

    let result = manager
        .with_session(&EngineConfig::default(), |_session| async move {
            Ok::<(), EngineError>(())
        })
        .await;

    match result {
        Err(EngineError::SessionCreation { source }) => {
            assert!(source.to_string().contains("chromedriver"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(driver.quits().is_empty());
}

#[tokio::test]
async fn release_is_idempotent_and_guaranteed_after_failures() {
    let dir = tempfile::tempdir().expect("tempdir");
    let driver = FakeDriver::new();
    driver.mark_missing(&Locator::id("ghost"));

    let config = fast_config(dir.path());
    let logger = quiet_logger();
    let manager = SessionManager::new(
        Arc::clone(&driver) as Arc<dyn DriverProtocol>,
        Arc::clone(&logger),
    );

    let result: Result<(), EngineError> = manager
        .with_session(&config, |session| {
            let driver = Arc::clone(&driver) as Arc<dyn DriverProtocol>;
            let config = config.clone();
            let logger = Arc::clone(&logger);
            async move {
                let facade = InteractionFacade::new(driver, session, &config, logger);
                facade.click(&Locator::id("ghost")).await
            }
        })
        .await;

    assert!(result.is_err());
    // Released exactly once despite the failing unit of work.
    assert_eq!(driver.quits(), ["session-1"]);
}

#[tokio::test]
async fn operations_against_a_released_session_fail_dead_not_retried() {
    let dir = tempfile::tempdir().expect("tempdir");
    let driver = FakeDriver::new();

    let config = fast_config(dir.path());
    let logger = quiet_logger();
    let manager = SessionManager::new(
        Arc::clone(&driver) as Arc<dyn DriverProtocol>,
        Arc::clone(&logger),
    );
    let session = manager.acquire(&config).await.expect("session");
    let facade = InteractionFacade::new(
        Arc::clone(&driver) as Arc<dyn DriverProtocol>,
        session.clone(),
        &config,
        logger,
    );

    // Simulates a higher-level timeout forcibly tearing the session down
    // while work is still scheduled.
    manager.release(&session).await;

    let started = Instant::now();
    let error = facade
        .click(&Locator::id("anything"))
        .await
        .expect_err("session is gone");

    assert!(matches!(error, EngineError::SessionDead { .. }));
    // Failed on the first attempt instead of burning the retry budget.
    assert_eq!(driver.op_count(session.id(), "find"), 1);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn concurrent_workers_stay_inside_their_own_sessions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let driver = FakeDriver::new();
    let config = fast_config(dir.path());

    let mut workers = Vec::new();
    for _ in 0..2 {
        let driver = Arc::clone(&driver);
        let config = config.clone();
        workers.push(tokio::spawn(async move {
            let logger = quiet_logger();
            let manager = SessionManager::new(
                Arc::clone(&driver) as Arc<dyn DriverProtocol>,
                Arc::clone(&logger),
            );
            manager
                .with_session(&config, |session| {
                    let driver = Arc::clone(&driver) as Arc<dyn DriverProtocol>;
                    let config = config.clone();
                    let logger = Arc::clone(&logger);
                    async move {
                        let facade =
                            InteractionFacade::new(driver, session.clone(), &config, logger);
                        let locator = Locator::css(".status");
                        for _ in 0..100 {
                            let text = facade.read_text(&locator).await?;
                            // Every read lands on this worker's own session.
                            assert_eq!(text, session.id());
                        }
                        Ok::<String, EngineError>(session.id().to_string())
                    }
                })
                .await
        }));
    }

    let mut session_ids = HashSet::new();
    for worker in workers {
        let id = worker.await.expect("join").expect("worker run");
        session_ids.insert(id);
    }

    assert_eq!(session_ids.len(), 2);
    assert_eq!(driver.violations(), 0);
    assert_eq!(driver.quits().len(), 2);
}

#[tokio::test]
async fn wait_evaluator_tracks_text_across_dom_updates() {
    let driver = FakeDriver::new();
    driver.script_texts(vec!["loading", "loading", "loaded 3 items"]);

    let logger = quiet_logger();
    let manager = SessionManager::new(
        Arc::clone(&driver) as Arc<dyn DriverProtocol>,
        Arc::clone(&logger),
    );
    let session = manager
        .acquire(&EngineConfig::default())
        .await
        .expect("session");

    let evaluator = WaitEvaluator::new(Arc::clone(&driver) as Arc<dyn DriverProtocol>, logger);
    let condition = WaitCondition::TextSatisfies(
        Locator::id("status"),
        TextPredicate::Matches(Regex::new(r"loaded \d+ items").expect("regex")),
    );

    let handle = evaluator
        .until(
            session.id(),
            &condition,
            Duration::from_millis(500),
            Duration::from_millis(10),
        )
        .await
        .expect("text eventually matches");
    assert_eq!(handle.session_id, session.id());
    manager.release(&session).await;
}
