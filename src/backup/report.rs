use serde::Serialize;

use crate::retention::EvictionReport;

/// Overall outcome of one backup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every stage completed.
    Success,
    /// A local artifact exists but the run was not fully successful:
    /// the upload failed, or retention had isolated failures.
    Partial,
    /// No artifact was produced.
    Failed,
}

impl RunStatus {
    /// 0 = success, 1 = failed, 2 = partial, so a scheduler can tell
    /// the three apart.
    pub fn exit_code(self) -> u8 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failed => 1,
            RunStatus::Partial => 2,
        }
    }
}

/// States of the run's state machine. Transitions are strictly
/// forward; there are no retries within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Idle,
    Dumping,
    Compressing,
    Uploading,
    Retaining,
    Done,
}

/// Outcome of a single stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "detail")]
pub enum StageOutcome {
    Ok,
    Skipped,
    Failed(String),
}

impl StageOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, StageOutcome::Ok)
    }

    pub fn failed(err: impl std::fmt::Display) -> Self {
        StageOutcome::Failed(err.to_string())
    }
}

/// Structured summary of one orchestration pass: the run's observable
/// output, suitable for logging or scheduler-status reporting.
#[derive(Debug, Serialize)]
pub struct RunResult {
    pub status: RunStatus,
    /// Where the pipeline stopped making progress: the failing stage,
    /// or [RunStage::Done] when dump, compress and upload all
    /// completed. Retention runs in every case and reports through its
    /// own field.
    pub stage_reached: RunStage,
    pub dump: StageOutcome,
    pub compress: StageOutcome,
    pub upload: StageOutcome,
    pub retention: StageOutcome,
    /// Final artifact name, set once compression has produced it.
    pub artifact_name: Option<String>,
    pub remote_object_id: Option<String>,
    pub local_eviction: Option<EvictionReport>,
    pub remote_eviction: Option<EvictionReport>,
}
