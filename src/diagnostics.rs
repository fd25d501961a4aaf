//! Failure-triggered diagnostic capture.
//!
//! When an operation exhausts its retries, the recorder writes a screenshot
//! and a structured record to the diagnostic sink before the failure reaches
//! the caller, so the artifact exists at the moment the failure is observed.
//! Capture is best-effort throughout: a session that can no longer produce a
//! screenshot still yields a record with the text context, and the absence
//! of a screenshot never masks the failure it documents.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::fs;

use crate::driver::DriverProtocol;
use crate::logging::TestLogger;

/// One captured failure artifact: what failed, where, and the screenshot if
/// one could be taken. Records are written once and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagnosticRecord {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub operation: String,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<PathBuf>,
}

/// Captures screenshots and structured records at terminal failures.
///
/// Artifact names embed the session identifier, a millisecond timestamp,
/// and a per-recorder counter, so concurrent workers writing into a shared
/// directory never collide and no locking is needed.
pub struct DiagnosticRecorder {
    driver: Arc<dyn DriverProtocol>,
    directory: PathBuf,
    screenshots_enabled: bool,
    sequence: AtomicU64,
    logger: Arc<TestLogger>,
}

impl DiagnosticRecorder {
    pub fn new(
        driver: Arc<dyn DriverProtocol>,
        directory: PathBuf,
        screenshots_enabled: bool,
        logger: Arc<TestLogger>,
    ) -> Self {
        Self {
            driver,
            directory,
            screenshots_enabled,
            sequence: AtomicU64::new(0),
            logger,
        }
    }

    /// Captures one diagnostic record for a failed operation. Infallible by
    /// design: whatever goes wrong during capture is logged, and the record
    /// that could be assembled is still returned.
    pub async fn capture(
        &self,
        session_id: &str,
        operation: &str,
        context: &str,
    ) -> DiagnosticRecord {
        let timestamp = Utc::now();
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let stem = format!(
            "{session_id}_{}_{}-{sequence:04}",
            sanitize(operation),
            timestamp.format("%Y%m%d_%H%M%S%3f"),
        );

        if let Err(error) = fs::create_dir_all(&self.directory).await {
            self.logger.warn(
                format!(
                    "could not create diagnostics directory {}: {error}",
                    self.directory.display()
                ),
                Some("diagnostic"),
                None,
            );
        }

        let mut screenshot_path = None;
        if self.screenshots_enabled {
            match self.driver.take_screenshot(session_id).await {
                Ok(bytes) => {
                    let path = self.directory.join(format!("{stem}.png"));
                    match fs::write(&path, &bytes).await {
                        Ok(()) => {
                            self.logger.info(
                                format!("failure screenshot captured: {}", path.display()),
                                Some("diagnostic"),
                                None,
                            );
                            screenshot_path = Some(path);
                        }
                        Err(error) => {
                            self.logger.warn(
                                format!(
                                    "failed to write screenshot {}: {error}",
                                    path.display()
                                ),
                                Some("diagnostic"),
                                None,
                            );
                        }
                    }
                }
                Err(error) => {
                    self.logger.warn(
                        format!("screenshot capture failed for session {session_id}: {error}"),
                        Some("diagnostic"),
                        None,
                    );
                }
            }
        }

        let record = DiagnosticRecord {
            timestamp,
            session_id: session_id.to_string(),
            operation: operation.to_string(),
            context: context.to_string(),
            screenshot_path,
        };

        self.persist(&record, &stem).await;

        self.logger.error(
            format!("{operation} failed: {context}"),
            Some("diagnostic"),
            Some(json!({
                "session_id": record.session_id,
                "operation": record.operation,
                "screenshot": record.screenshot_path,
            })),
        );

        record
    }

    /// Writes the record as a JSON sidecar next to the screenshot. Sidecar
    /// names are disjoint across workers for the same reason the screenshot
    /// names are, so the shared directory needs no coordination.
    async fn persist(&self, record: &DiagnosticRecord, stem: &str) {
        let path = self.directory.join(format!("{stem}.json"));
        let payload = match serde_json::to_vec_pretty(record) {
            Ok(payload) => payload,
            Err(error) => {
                self.logger.warn(
                    format!("failed to serialize diagnostic record: {error}"),
                    Some("diagnostic"),
                    None,
                );
                return;
            }
        };
        if let Err(error) = fs::write(&path, payload).await {
            self.logger.warn(
                format!("failed to write diagnostic record {}: {error}", path.display()),
                Some("diagnostic"),
                None,
            );
        }
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
