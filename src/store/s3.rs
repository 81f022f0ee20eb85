// backuptool/src/store/s3.rs
use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3 as s3;
use chrono::DateTime;
use s3::config::Region;
use s3::error::{ProvideErrorMetadata, SdkError};
use s3::primitives::ByteStream;

use crate::config::RemoteStoreConfig;
use crate::errors::StoreError;
use crate::store::{RemoteObject, RemoteStore};

/// [RemoteStore] backed by an S3-compatible service (AWS S3,
/// DigitalOcean Spaces, MinIO) via the AWS SDK.
pub struct S3RemoteStore {
    client: s3::Client,
    bucket: String,
}

impl S3RemoteStore {
    pub async fn connect(config: &RemoteStoreConfig) -> Self {
        let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(s3::config::Credentials::new(
                &config.access_key_id,
                &config.secret_access_key,
                None,
                None,
                "Static",
            ));
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        Self {
            client: s3::Client::new(&sdk_config),
            bucket: config.bucket.clone(),
        }
    }

    fn object_key(location_id: &str, name: &str) -> String {
        let prefix = location_id.trim_matches('/');
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}/{name}")
        }
    }
}

/// Maps SDK failures onto the store error taxonomy so the caller can
/// tell an auth problem from a flaky network.
fn classify<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata,
{
    let detail = match err.message() {
        Some(message) => format!("{err}: {message}"),
        None => err.to_string(),
    };
    let transport_failure = matches!(
        &err,
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_)
    );
    match err.code() {
        Some("AccessDenied") | Some("InvalidAccessKeyId") | Some("SignatureDoesNotMatch") => {
            StoreError::AccessDenied(detail)
        }
        Some("NoSuchBucket") | Some("NoSuchKey") => StoreError::LocationNotFound(detail),
        Some("QuotaExceeded") | Some("ServiceQuotaExceeded") => StoreError::QuotaExceeded(detail),
        _ if transport_failure => StoreError::Network(detail),
        _ => StoreError::Other(detail),
    }
}

#[async_trait]
impl RemoteStore for S3RemoteStore {
    async fn list(&self, location_id: &str) -> Result<Vec<RemoteObject>, StoreError> {
        let prefix = location_id.trim_matches('/');
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);
            if !prefix.is_empty() {
                request = request.prefix(format!("{prefix}/"));
            }
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }
            let page = request.send().await.map_err(classify)?;

            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let name = key.rsplit('/').next().unwrap_or(key).to_string();
                if name.is_empty() {
                    // folder placeholder objects have keys ending in '/'
                    continue;
                }
                objects.push(RemoteObject {
                    id: key.to_string(),
                    name,
                    size: object.size().unwrap_or(0).max(0) as u64,
                    created_at: object
                        .last_modified()
                        .and_then(|t| DateTime::from_timestamp(t.secs(), 0)),
                });
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated() == Some(true) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(objects)
    }

    async fn upload(
        &self,
        location_id: &str,
        name: &str,
        source: &Path,
    ) -> Result<String, StoreError> {
        let key = Self::object_key(location_id, name);
        let body = ByteStream::from_path(source).await.map_err(|e| {
            StoreError::Other(format!(
                "failed to open {} for upload: {e}",
                source.display()
            ))
        })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type("application/gzip")
            .body(body)
            .send()
            .await
            .map_err(classify)?;

        Ok(key)
    }

    async fn delete(&self, object_id: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(object_id)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keys_nest_under_the_location_prefix() {
        assert_eq!(
            S3RemoteStore::object_key("prod/backups", "shop_backup_20240115_143022.sql.gz"),
            "prod/backups/shop_backup_20240115_143022.sql.gz"
        );
        assert_eq!(
            S3RemoteStore::object_key("/prod/", "a.sql.gz"),
            "prod/a.sql.gz"
        );
        assert_eq!(S3RemoteStore::object_key("", "a.sql.gz"), "a.sql.gz");
    }
}
