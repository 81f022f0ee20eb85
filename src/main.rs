//! Scheduled database backup to S3-compatible object storage.
//!
//! Dumps one database with `mysqldump`, gzips the dump, uploads it to
//! a bucket and applies count/age based retention to both the local
//! backup directory and the remote location. Designed to be driven by
//! an external scheduler (cron or similar); the scheduler must also
//! guarantee that runs for the same database never overlap, as no
//! internal locking is performed.

// backuptool/src/main.rs
mod artifact;
mod backup;
mod config;
mod errors;
mod retention;
mod store;

use std::process::ExitCode;

use anyhow::{Context, Result};

use crate::backup::RunStatus;
use crate::config::AppConfig;
use crate::store::s3::S3RemoteStore;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run_app().await {
        Ok(status) => {
            match status {
                RunStatus::Success => println!("✅ Backup completed successfully."),
                RunStatus::Partial => println!("⚠️ Backup completed with problems."),
                RunStatus::Failed => println!("❌ Backup failed."),
            }
            ExitCode::from(status.exit_code())
        }
        Err(e) => {
            eprintln!("❌ Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<RunStatus> {
    let config = AppConfig::from_env()
        .context("Configuration is incomplete; set the required environment variables")?;

    std::fs::create_dir_all(&config.backup_dir).with_context(|| {
        format!(
            "Failed to create local backup directory {}",
            config.backup_dir.display()
        )
    })?;

    let store = S3RemoteStore::connect(&config.remote).await;
    let result = backup::run_backup_flow(&config, &store).await;

    // machine-readable summary for the scheduler
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("Failed to render run summary")?
    );
    Ok(result.status)
}
