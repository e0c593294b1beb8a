//! Cycle run records and engine status snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coordinator state: exactly one cycle is in flight at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Running,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Record of one analyze -> resolve -> dispatch pass.
///
/// Only the most recent run is retained by the engine; long-term cycle
/// analytics are an external concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleRun {
    /// Monotonic run id, assigned at cycle start.
    pub id: u64,
    /// Trigger kind (or synthetic reason) that requested this cycle.
    pub triggered_by: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub issue_count: usize,
    pub directive_count: usize,
    /// Non-fatal errors collected during the run (analyzer and dispatch
    /// failures), joined into one message. `None` for a clean run.
    pub error: Option<String>,
}

impl CycleRun {
    /// Start a new run record.
    pub fn begin(id: u64, triggered_by: impl Into<String>) -> Self {
        Self {
            id,
            triggered_by: triggered_by.into(),
            started_at: Utc::now(),
            finished_at: None,
            issue_count: 0,
            directive_count: 0,
            error: None,
        }
    }

    /// Finalize the record with collected counts and errors.
    pub fn finish(mut self, issue_count: usize, directive_count: usize, errors: Vec<String>) -> Self {
        self.finished_at = Some(Utc::now());
        self.issue_count = issue_count;
        self.directive_count = directive_count;
        self.error = if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        };
        self
    }
}

/// Read-only snapshot of the engine for external monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub last_cycle: Option<CycleRun>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_run_finish_clean() {
        let run = CycleRun::begin(1, "error-volume").finish(3, 2, vec![]);
        assert_eq!(run.issue_count, 3);
        assert_eq!(run.directive_count, 2);
        assert!(run.error.is_none());
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_cycle_run_finish_with_errors() {
        let run = CycleRun::begin(2, "deploy-hook").finish(
            0,
            0,
            vec!["analyzer lint failed".to_string(), "dispatch exhausted".to_string()],
        );
        assert_eq!(
            run.error.as_deref(),
            Some("analyzer lint failed; dispatch exhausted")
        );
    }

    #[test]
    fn test_engine_state_display() {
        assert_eq!(EngineState::Idle.to_string(), "idle");
        assert_eq!(EngineState::Running.to_string(), "running");
    }
}
