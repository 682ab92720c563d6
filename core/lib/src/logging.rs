use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::error::EbiResult;

pub const LOG_FILE_NAME: &str = "ebi-steps.log";

/// One orchestration step as it was recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepLogEntry {
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub step: String,
    pub target: String,
    pub status: OperationStatus,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Started,
    Completed,
    Failed,
    Skipped,
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationStatus::Started => write!(f, "STARTED"),
            OperationStatus::Completed => write!(f, "COMPLETED"),
            OperationStatus::Failed => write!(f, "FAILED"),
            OperationStatus::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Records the steps of one command run.
///
/// Every entry goes to `tracing`; entries are also kept in memory for the
/// final summary and, when a log directory is configured, appended to
/// `ebi-steps.log` as JSON lines.
#[derive(Debug)]
pub struct DeploymentLogger {
    run_id: String,
    log_file_path: Option<PathBuf>,
    entries: Vec<StepLogEntry>,
}

impl DeploymentLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            log_file_path: None,
            entries: Vec::new(),
        }
    }

    /// Also append entries to `<log_dir>/ebi-steps.log`.
    pub fn with_log_dir<P: AsRef<Path>>(
        run_id: impl Into<String>,
        log_dir: P,
    ) -> std::io::Result<Self> {
        let log_dir = log_dir.as_ref();
        std::fs::create_dir_all(log_dir)?;

        Ok(Self {
            run_id: run_id.into(),
            log_file_path: Some(log_dir.join(LOG_FILE_NAME)),
            entries: Vec::new(),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn entries(&self) -> &[StepLogEntry] {
        &self.entries
    }

    /// Steps that reached `Completed`, in order.
    pub fn completed_steps(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.status == OperationStatus::Completed)
            .map(|e| e.step.as_str())
            .collect()
    }

    pub fn record(
        &mut self,
        step: &str,
        target: &str,
        status: OperationStatus,
        duration_ms: Option<u64>,
        error: Option<String>,
    ) {
        let entry = StepLogEntry {
            timestamp: Utc::now(),
            run_id: self.run_id.clone(),
            step: step.to_string(),
            target: target.to_string(),
            status,
            duration_ms,
            error,
        };

        match entry.status {
            OperationStatus::Failed => error!(
                run_id = %entry.run_id,
                step = %entry.step,
                target = %entry.target,
                duration_ms = entry.duration_ms,
                error = entry.error.as_deref().unwrap_or_default(),
                "step failed"
            ),
            OperationStatus::Skipped => info!(
                run_id = %entry.run_id,
                step = %entry.step,
                target = %entry.target,
                "step skipped"
            ),
            _ => info!(
                run_id = %entry.run_id,
                step = %entry.step,
                target = %entry.target,
                status = %entry.status,
                duration_ms = entry.duration_ms,
                "step"
            ),
        }

        if let Err(e) = self.append_to_file(&entry) {
            warn!(error = %e, "could not write step log file");
        }
        self.entries.push(entry);
    }

    pub fn skipped(&mut self, step: &str, target: &str) {
        self.record(step, target, OperationStatus::Skipped, None, None);
    }

    /// Run `operation`, recording its start, duration and outcome.
    pub async fn timed<T, F>(&mut self, step: &str, target: &str, operation: F) -> EbiResult<T>
    where
        F: Future<Output = EbiResult<T>>,
    {
        self.record(step, target, OperationStatus::Started, None, None);
        let start = Instant::now();
        let result = operation.await;
        let duration_ms = Some(start.elapsed().as_millis() as u64);

        match &result {
            Ok(_) => self.record(step, target, OperationStatus::Completed, duration_ms, None),
            Err(e) => self.record(
                step,
                target,
                OperationStatus::Failed,
                duration_ms,
                Some(e.to_string()),
            ),
        }

        result
    }

    fn append_to_file(&self, entry: &StepLogEntry) -> std::io::Result<()> {
        let Some(path) = &self.log_file_path else {
            return Ok(());
        };

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let json_line = serde_json::to_string(entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(file, "{}", json_line)?;
        file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EbiError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_timed_records_start_and_outcome() {
        let mut logger = DeploymentLogger::new("run-1");

        let value = logger
            .timed("stage", "demo", async { Ok::<_, EbiError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);

        let err = logger
            .timed("deploy", "demo-green", async {
                Err::<(), _>(EbiError::subprocess(2, "eb deploy"))
            })
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let statuses: Vec<_> = logger.entries().iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![
                OperationStatus::Started,
                OperationStatus::Completed,
                OperationStatus::Started,
                OperationStatus::Failed,
            ]
        );
        assert_eq!(logger.completed_steps(), vec!["stage"]);
        assert!(logger.entries()[3].error.as_deref().unwrap().contains("eb deploy"));
    }

    #[test]
    fn test_writes_json_lines_when_log_dir_is_set() {
        let temp_dir = TempDir::new().unwrap();
        let mut logger = DeploymentLogger::with_log_dir("run-2", temp_dir.path()).unwrap();

        logger.skipped("swap", "demo-green");
        logger.record("done", "demo", OperationStatus::Completed, Some(5), None);

        let content = std::fs::read_to_string(temp_dir.path().join(LOG_FILE_NAME)).unwrap();
        let lines: Vec<StepLogEntry> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].status, OperationStatus::Skipped);
        assert_eq!(lines[1].run_id, "run-2");
        assert_eq!(lines[1].duration_ms, Some(5));
    }
}
