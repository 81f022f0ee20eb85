use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum DumpError {
    #[error("mysqldump executable not found in PATH")]
    ToolNotFound(#[source] which::Error),

    #[error("database access denied for user {user}")]
    AccessDenied { user: String },

    #[error("cannot reach database server at {host}:{port}")]
    ConnectionFailed { host: String, port: u16 },

    #[error("mysqldump exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("mysqldump exited successfully but produced no output")]
    EmptyDump,

    #[error("dump did not finish within {seconds}s")]
    Timeout { seconds: u64 },

    #[error("dump I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("dump file missing: {0}")]
    SourceMissing(PathBuf),

    #[error("compressed file failed verification: {0}")]
    Verification(PathBuf),

    #[error("compression I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("authorization denied by remote store: {0}")]
    AccessDenied(String),

    #[error("remote location not found: {0}")]
    LocationNotFound(String),

    #[error("remote store quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("network failure talking to remote store: {0}")]
    Network(String),

    #[error("remote store error: {0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("uploaded object {name} is missing from the post-upload listing")]
    Verification { name: String },

    #[error("upload did not finish within {seconds}s")]
    Timeout { seconds: u64 },

    #[error("failed to read artifact for upload: {0}")]
    Io(#[from] std::io::Error),
}
