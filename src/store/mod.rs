pub mod s3;

#[cfg(test)]
pub mod memory;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::StoreError;

/// One object in a remote listing.
#[derive(Debug, Clone)]
pub struct RemoteObject {
    pub id: String,
    pub name: String,
    pub size: u64,
    /// Store-reported creation time. Informational only: retention
    /// works off the timestamp embedded in the name.
    pub created_at: Option<DateTime<Utc>>,
}

/// Folder-like object store holding uploaded backups.
///
/// `location_id` addresses a folder-like container; the empty string
/// means the store root. Implementations authenticate at construction
/// and callers never see credential contents.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list(&self, location_id: &str) -> Result<Vec<RemoteObject>, StoreError>;

    /// Uploads the file at `source` under `name`, returning the new
    /// object's id.
    async fn upload(&self, location_id: &str, name: &str, source: &Path)
    -> Result<String, StoreError>;

    async fn delete(&self, object_id: &str) -> Result<(), StoreError>;
}
