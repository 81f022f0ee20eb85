// backuptool/src/backup/db_dump.rs
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use which::which;

use crate::artifact::ArtifactRecord;
use crate::config::DatabaseConfig;
use crate::errors::DumpError;

/// Produces a point-in-time logical dump as a local file.
///
/// The production implementation shells out to `mysqldump`; tests
/// substitute their own.
#[async_trait]
pub trait DumpProducer: Send + Sync {
    /// Streams the dump to `output_path`. On success exactly one file
    /// exists there; after any failure no file is left behind.
    async fn produce(
        &self,
        output_path: &Path,
        created_at: NaiveDateTime,
    ) -> Result<ArtifactRecord, DumpError>;
}

/// [DumpProducer] backed by the `mysqldump` client tool.
pub struct MysqldumpProducer {
    database: DatabaseConfig,
    timeout: Duration,
}

impl MysqldumpProducer {
    pub fn new(database: DatabaseConfig, timeout: Duration) -> Self {
        Self { database, timeout }
    }

    fn locate_tool() -> Result<PathBuf, DumpError> {
        which("mysqldump").map_err(DumpError::ToolNotFound)
    }

    fn classify_failure(&self, stderr: &str, status: ExitStatus) -> DumpError {
        if stderr.contains("Access denied") {
            DumpError::AccessDenied {
                user: self.database.user.clone(),
            }
        } else if stderr.contains("Can't connect")
            || stderr.contains("Unknown MySQL server host")
            || stderr.contains("Lost connection")
        {
            DumpError::ConnectionFailed {
                host: self.database.host.clone(),
                port: self.database.port,
            }
        } else {
            DumpError::Failed {
                status,
                stderr: stderr.trim().to_string(),
            }
        }
    }
}

/// Collects stderr until the tool closes it, then reaps the exit
/// status. Reading first keeps a chatty tool from blocking on a full
/// pipe.
async fn wait_for_dump(child: &mut Child, stderr_buf: &mut Vec<u8>) -> std::io::Result<ExitStatus> {
    if let Some(mut stderr) = child.stderr.take() {
        stderr.read_to_end(stderr_buf).await?;
    }
    child.wait().await
}

fn remove_partial(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!(target: "dump", "Could not remove partial dump {}: {e}", path.display());
        }
    }
}

#[async_trait]
impl DumpProducer for MysqldumpProducer {
    async fn produce(
        &self,
        output_path: &Path,
        created_at: NaiveDateTime,
    ) -> Result<ArtifactRecord, DumpError> {
        let tool = Self::locate_tool()?;
        log::info!(target: "dump",
            "Dumping database {} from {}:{} to {}",
            self.database.name,
            self.database.host,
            self.database.port,
            output_path.display()
        );

        let output_file = std::fs::File::create(output_path)?;
        let mut command = Command::new(tool);
        command
            .arg(format!("--user={}", self.database.user))
            .arg(format!("--password={}", self.database.password))
            .arg(format!("--host={}", self.database.host))
            .arg(format!("--port={}", self.database.port))
            .arg("--single-transaction")
            .arg("--quick")
            .arg("--lock-tables=false")
            .arg(&self.database.name)
            .stdin(Stdio::null())
            .stdout(Stdio::from(output_file))
            .stderr(Stdio::piped());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                remove_partial(output_path);
                return Err(DumpError::Io(e));
            }
        };

        let mut stderr_buf = Vec::new();
        let waited =
            tokio::time::timeout(self.timeout, wait_for_dump(&mut child, &mut stderr_buf)).await;
        let status = match waited {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                remove_partial(output_path);
                return Err(DumpError::Io(e));
            }
            Err(_elapsed) => {
                if let Err(e) = child.kill().await {
                    log::warn!(target: "dump", "Could not kill timed out mysqldump: {e}");
                }
                remove_partial(output_path);
                return Err(DumpError::Timeout {
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        if !status.success() {
            // a partial dump would only confuse later stages
            remove_partial(output_path);
            let stderr_text = String::from_utf8_lossy(&stderr_buf);
            return Err(self.classify_failure(&stderr_text, status));
        }

        let size = match std::fs::metadata(output_path) {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                remove_partial(output_path);
                return Err(DumpError::Io(e));
            }
        };
        if size == 0 {
            remove_partial(output_path);
            return Err(DumpError::EmptyDump);
        }

        log::info!(target: "dump", "Dump of {} finished, {size} bytes written", self.database.name);
        Ok(ArtifactRecord::local(
            output_path.to_path_buf(),
            size,
            created_at,
        ))
    }
}
