use chrono::NaiveDateTime;

use crate::artifact::{self, ArtifactRecord};
use crate::backup::archive;
use crate::backup::db_dump::DumpProducer;
use crate::backup::report::{RunResult, RunStage, RunStatus, StageOutcome};
use crate::backup::upload;
use crate::config::AppConfig;
use crate::retention::{self, EvictionReport};
use crate::store::RemoteStore;

/// Forward-only cursor over the run's states.
struct StateMachine {
    stage: RunStage,
}

impl StateMachine {
    fn new() -> Self {
        Self {
            stage: RunStage::Idle,
        }
    }

    fn advance(&mut self, next: RunStage) {
        debug_assert!(next > self.stage, "run states only move forward");
        log::debug!(target: "flow", "{:?} -> {next:?}", self.stage);
        self.stage = next;
    }
}

/// Drives one full run: dump, compress, upload, retain.
///
/// Each stage short-circuits the pipeline on failure, but retention is
/// always attempted afterwards as a best-effort hygiene pass, so disk
/// and remote usage stay bounded even under repeated partial failures.
/// Everything is folded into the returned [RunResult]; this function
/// never aborts the process.
pub(crate) async fn perform_backup_orchestration(
    config: &AppConfig,
    dumper: &dyn DumpProducer,
    store: &dyn RemoteStore,
    started_at: NaiveDateTime,
) -> RunResult {
    let database = &config.database.name;
    let mut state = StateMachine::new();
    log::info!(target: "flow", "Starting backup run for database {database}");

    // Dumping
    state.advance(RunStage::Dumping);
    let dump_path = config
        .backup_dir
        .join(artifact::dump_name(database, started_at));
    let dump_result = dumper.produce(&dump_path, started_at).await;

    // Compressing
    let compress_result = match &dump_result {
        Ok(_) => {
            state.advance(RunStage::Compressing);
            Some(archive::compress_dump(&dump_path, started_at))
        }
        Err(e) => {
            log::error!(target: "flow", "Dump failed, nothing to compress: {e}");
            None
        }
    };

    let final_artifact: Option<ArtifactRecord> = match &compress_result {
        Some(Ok(record)) => Some(record.clone()),
        Some(Err(e)) => {
            log::error!(target: "flow", "Compression failed, dump kept at {}: {e}", dump_path.display());
            None
        }
        None => None,
    };

    // Uploading
    let upload_result = match &final_artifact {
        Some(record) => {
            state.advance(RunStage::Uploading);
            Some(
                upload::upload_artifact(
                    store,
                    &config.remote.location,
                    record,
                    config.upload_timeout,
                )
                .await,
            )
        }
        None => None,
    };
    match &upload_result {
        Some(Ok(remote)) => {
            log::info!(target: "flow", "Remote copy {} confirmed ({} bytes)", remote.name, remote.size);
        }
        Some(Err(e)) => {
            log::error!(target: "flow", "Upload failed, local artifact kept: {e}");
        }
        None => {}
    }

    // Retaining runs regardless of how far the pipeline got.
    state.advance(RunStage::Retaining);
    let (local_eviction, remote_eviction, retention_outcome) =
        run_retention(config, store, started_at).await;

    state.advance(RunStage::Done);

    let dump_outcome = match &dump_result {
        Ok(_) => StageOutcome::Ok,
        Err(e) => StageOutcome::failed(e),
    };
    let compress_outcome = match &compress_result {
        None => StageOutcome::Skipped,
        Some(Ok(_)) => StageOutcome::Ok,
        Some(Err(e)) => StageOutcome::failed(e),
    };
    let upload_outcome = match &upload_result {
        None => StageOutcome::Skipped,
        Some(Ok(_)) => StageOutcome::Ok,
        Some(Err(e)) => StageOutcome::failed(e),
    };

    let stage_reached = if !dump_outcome.is_ok() {
        RunStage::Dumping
    } else if !compress_outcome.is_ok() {
        RunStage::Compressing
    } else if !upload_outcome.is_ok() {
        RunStage::Uploading
    } else {
        RunStage::Done
    };

    let status = if !dump_outcome.is_ok() || !compress_outcome.is_ok() {
        RunStatus::Failed
    } else if !upload_outcome.is_ok() || !retention_outcome.is_ok() {
        RunStatus::Partial
    } else {
        RunStatus::Success
    };
    log::info!(target: "flow", "Backup run for {database} finished: {status:?}");

    RunResult {
        status,
        stage_reached,
        dump: dump_outcome,
        compress: compress_outcome,
        upload: upload_outcome,
        retention: retention_outcome,
        artifact_name: final_artifact.map(|record| record.name),
        remote_object_id: upload_result
            .and_then(|result| result.ok())
            .map(|remote| remote.object_id),
        local_eviction,
        remote_eviction,
    }
}

/// Runs the two independent retention passes, local directory first,
/// then the remote location, with the same policy over different
/// inventories. Failures are reported, never escalated.
async fn run_retention(
    config: &AppConfig,
    store: &dyn RemoteStore,
    now: NaiveDateTime,
) -> (Option<EvictionReport>, Option<EvictionReport>, StageOutcome) {
    let database = &config.database.name;
    let policy = &config.retention;
    let mut problems: Vec<String> = Vec::new();

    let local_report = match retention::collect_local_artifacts(&config.backup_dir, database) {
        Ok(artifacts) => Some(retention::run_pass(artifacts, policy, now, store).await),
        Err(e) => {
            log::warn!(target: "retention",
                "Could not list local backups in {}: {e}",
                config.backup_dir.display()
            );
            problems.push(format!("local listing failed: {e}"));
            None
        }
    };

    let remote_report =
        match retention::collect_remote_artifacts(store, &config.remote.location, database).await {
            Ok(artifacts) => Some(retention::run_pass(artifacts, policy, now, store).await),
            Err(e) => {
                log::warn!(target: "retention", "Could not list remote backups: {e}");
                problems.push(format!("remote listing failed: {e}"));
                None
            }
        };

    for report in [&local_report, &remote_report].into_iter().flatten() {
        for failure in &report.failures {
            problems.push(format!("{}: {}", failure.name, failure.reason));
        }
    }

    let outcome = if problems.is_empty() {
        StageOutcome::Ok
    } else {
        StageOutcome::Failed(problems.join("; "))
    };
    (local_report, remote_report, outcome)
}
