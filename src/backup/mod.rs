mod logic;
pub(crate) mod archive;
pub(crate) mod db_dump;
pub(crate) mod report;
pub(crate) mod upload;

pub use report::{RunResult, RunStatus};

use chrono::Local;

use crate::backup::db_dump::MysqldumpProducer;
use crate::config::AppConfig;
use crate::store::RemoteStore;

/// Public entry point for the backup process.
///
/// Wires the production dump producer to the orchestration flow. The
/// run timestamp is taken once here and names every artifact of the
/// run. Never returns an error: everything past configuration is
/// folded into the [RunResult].
pub async fn run_backup_flow(config: &AppConfig, store: &dyn RemoteStore) -> RunResult {
    let dumper = MysqldumpProducer::new(config.database.clone(), config.dump_timeout);
    let started_at = Local::now().naive_local();
    logic::perform_backup_orchestration(config, &dumper, store, started_at).await
}
