//! Port for the binary object store holding image bytes.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{GroupId, StorageKey};

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by object store adapters.
    pub enum ObjectStoreError {
        /// Store infrastructure is unreachable.
        Unavailable { message: String } => "object store is unavailable: {message}",
        /// The store refused the operation.
        Rejected { message: String } => "object store rejected the request: {message}",
    }
}

/// Put, sign, and delete image objects by opaque key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under a fresh key scoped to `scope` and return the key.
    async fn put(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        scope: GroupId,
    ) -> Result<StorageKey, ObjectStoreError>;

    /// Time-limited URL for reading `key`.
    async fn signed_url(&self, key: &StorageKey, ttl: Duration)
    -> Result<String, ObjectStoreError>;

    /// Remove `key`. Deleting a missing object succeeds.
    async fn delete(&self, key: &StorageKey) -> Result<(), ObjectStoreError>;
}
