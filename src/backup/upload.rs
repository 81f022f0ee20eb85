use std::path::Path;
use std::time::Duration;

use crate::artifact::{ArtifactLocation, ArtifactRecord};
use crate::errors::UploadError;
use crate::store::RemoteStore;

/// Remote copy of an artifact, as confirmed by the post-upload listing.
#[derive(Debug, Clone)]
pub struct RemoteArtifactRecord {
    pub object_id: String,
    pub name: String,
    pub size: u64,
}

/// Pushes `artifact` to `store` under `location_id` and confirms the
/// object is listable afterwards. An upload that cannot be verified is
/// an error, never a success. The local file is left in place either
/// way; local cleanup belongs to retention.
pub async fn upload_artifact(
    store: &dyn RemoteStore,
    location_id: &str,
    artifact: &ArtifactRecord,
    timeout: Duration,
) -> Result<RemoteArtifactRecord, UploadError> {
    let ArtifactLocation::Local(path) = &artifact.location else {
        return Err(UploadError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "artifact to upload is not a local file",
        )));
    };

    log::info!(target: "upload",
        "Uploading {} ({:.2} MB) to remote location {:?}",
        artifact.name,
        artifact.size as f64 / (1024.0 * 1024.0),
        location_id
    );

    let object_id = tokio::time::timeout(
        timeout,
        store.upload(location_id, &artifact.name, path.as_path()),
    )
    .await
    .map_err(|_elapsed| UploadError::Timeout {
        seconds: timeout.as_secs(),
    })??;

    let listing = store.list(location_id).await?;
    match listing.into_iter().find(|o| o.name == artifact.name) {
        Some(object) => {
            log::info!(target: "upload", "Upload of {} verified as object {}", artifact.name, object.id);
            log::debug!(target: "upload", "Store reports {} bytes, created at {:?}", object.size, object.created_at);
            Ok(RemoteArtifactRecord {
                object_id,
                name: artifact.name.clone(),
                size: object.size,
            })
        }
        None => Err(UploadError::Verification {
            name: artifact.name.clone(),
        }),
    }
}
