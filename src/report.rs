use crate::engine::Case;
use crate::errors::{HarnessError, Result};
use crate::types::{EnvType, Priority};
use crate::utils::screenshot::Attachment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub case_id: String,
    pub case_name: String,
    pub tags: Vec<String>,
    pub priority: Priority,
    pub status: CaseStatus,
    /// Executions of the case, reruns included
    pub attempts: u32,
    /// Dataset runs that completed in the final attempt
    pub runs: usize,
    /// Full cause chain of the failure
    pub error: Option<String>,
    pub duration_ms: u64,
    pub attachments: Vec<Attachment>,
}

impl CaseOutcome {
    pub fn passed(case: &Case, runs: usize, duration: Duration) -> Self {
        Self::new(case, CaseStatus::Passed, runs, None, duration)
    }

    pub fn failed(case: &Case, runs: usize, error: &HarnessError, duration: Duration) -> Self {
        Self::new(case, CaseStatus::Failed, runs, Some(error.chain()), duration)
    }

    fn new(
        case: &Case,
        status: CaseStatus,
        runs: usize,
        error: Option<String>,
        duration: Duration,
    ) -> Self {
        Self {
            case_id: case.case_id.clone(),
            case_name: case.case_name.clone(),
            tags: case.tags.clone(),
            priority: case.priority.clone(),
            status,
            attempts: 1,
            runs,
            error,
            duration_ms: duration.as_millis() as u64,
            attachments: Vec::new(),
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

/// Everything one `caseflow run` produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub env: EnvType,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cases: Vec<CaseOutcome>,
}

impl RunReport {
    pub fn new(env: EnvType) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            env,
            started_at: Utc::now(),
            finished_at: None,
            cases: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: CaseOutcome) {
        self.cases.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn summary(&self) -> Summary {
        let passed = self
            .cases
            .iter()
            .filter(|c| c.status == CaseStatus::Passed)
            .count();
        Summary {
            total: self.cases.len(),
            passed,
            failed: self.cases.len() - passed,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.summary().failed == 0
    }

    /// Write the report as pretty JSON to `<dir>/<env>/report_<time>_<id>.json`.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let env_dir = dir.join(self.env.as_str());
        std::fs::create_dir_all(&env_dir)?;
        let run_id = self.run_id.simple().to_string();
        let path = env_dir.join(format!(
            "report_{}_{}.json",
            self.started_at.format("%Y%m%d_%H%M%S"),
            &run_id[..8]
        ));
        std::fs::write(&path, serde_json::to_vec_pretty(self)?)?;
        info!("Report written to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_and_json_layout() {
        let case = Case::new("search_001");
        let mut report = RunReport::new(EnvType::Test);
        report.record(CaseOutcome::passed(&case, 2, Duration::from_millis(1500)));
        let err = HarnessError::element_operation("ID=su", "click", "not visible");
        report.record(
            CaseOutcome::failed(&Case::new("search_002"), 1, &err, Duration::ZERO).with_attempts(2),
        );
        report.finish();

        assert_eq!(
            report.summary(),
            Summary {
                total: 2,
                passed: 1,
                failed: 1
            }
        );
        assert!(!report.all_passed());

        let dir = tempfile::tempdir().unwrap();
        let path = report.write(dir.path()).unwrap();
        assert!(path.starts_with(dir.path().join("test")));

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(json["env"], "test");
        assert_eq!(json["cases"][0]["status"], "passed");
        assert_eq!(json["cases"][0]["duration_ms"], 1500);
        assert_eq!(json["cases"][1]["status"], "failed");
        assert_eq!(json["cases"][1]["runs"], 1);
        assert_eq!(json["cases"][1]["attempts"], 2);
        assert_eq!(json["cases"][0]["priority"], "normal");
        assert_eq!(
            json["cases"][1]["error"],
            "Element [ID=su] click failed: not visible"
        );
    }
}
