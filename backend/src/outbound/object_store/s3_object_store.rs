//! Amazon S3 [`ObjectStore`].
//!
//! Keys are laid out as `groups/{group_id}/{uuid}.{ext}` so one prefix holds
//! everything a group owns. Reads go through presigned GET URLs.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::ports::{ObjectStore, ObjectStoreError};
use crate::domain::{GroupId, StorageKey};

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client from the ambient AWS configuration.
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let bucket = bucket.into();
        info!(%bucket, "S3 object store configured");
        Self {
            client: Client::new(&config),
            bucket,
        }
    }
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "image/heif" => Some("heif"),
        _ => None,
    }
}

fn object_key(scope: GroupId, object_id: Uuid, content_type: &str) -> String {
    match extension_for(content_type) {
        Some(ext) => format!("groups/{scope}/{object_id}.{ext}"),
        None => format!("groups/{scope}/{object_id}"),
    }
}

fn unavailable(err: impl std::fmt::Display) -> ObjectStoreError {
    ObjectStoreError::unavailable(err.to_string())
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        scope: GroupId,
    ) -> Result<StorageKey, ObjectStoreError> {
        let key = object_key(scope, Uuid::new_v4(), content_type);
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(unavailable)?;
        debug!(%key, size, "object stored");
        StorageKey::new(key).map_err(|err| ObjectStoreError::rejected(err.to_string()))
    }

    async fn signed_url(
        &self,
        key: &StorageKey,
        ttl: Duration,
    ) -> Result<String, ObjectStoreError> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|err| ObjectStoreError::rejected(err.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .presigned(presigning)
            .await
            .map_err(unavailable)?;
        Ok(request.uri().to_string())
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), ObjectStoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(unavailable)?;
        debug!(key = %key, "object deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("image/jpeg", ".jpg")]
    #[case("image/heif", ".heif")]
    fn keys_carry_the_image_extension(#[case] content_type: &str, #[case] suffix: &str) {
        let group = GroupId::random();
        let id = Uuid::new_v4();
        let key = object_key(group, id, content_type);

        assert_eq!(key, format!("groups/{group}/{id}{suffix}"));
    }

    #[rstest]
    fn unknown_types_get_a_bare_key() {
        let group = GroupId::random();
        let id = Uuid::new_v4();
        assert_eq!(
            object_key(group, id, "application/octet-stream"),
            format!("groups/{group}/{id}")
        );
    }
}
