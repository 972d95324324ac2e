//! Object store double that keeps bytes in memory.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::ports::{ObjectStore, ObjectStoreError};
use crate::domain::{GroupId, StorageKey};

use super::lock;

#[derive(Default)]
pub struct RecordingObjectStore {
    objects: Mutex<HashMap<StorageKey, (String, Vec<u8>)>>,
    deleted: Mutex<Vec<StorageKey>>,
    failing_deletes: Mutex<HashSet<StorageKey>>,
}

impl RecordingObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object as if it had been uploaded earlier.
    pub fn with_object(self, key: &StorageKey) -> Self {
        lock(&self.objects, "objects").insert(
            key.clone(),
            ("application/octet-stream".to_owned(), Vec::new()),
        );
        self
    }

    pub fn fail_delete_of(&self, key: &StorageKey) {
        lock(&self.failing_deletes, "delete failures").insert(key.clone());
    }

    pub fn contains(&self, key: &StorageKey) -> bool {
        lock(&self.objects, "objects").contains_key(key)
    }

    pub fn content_type(&self, key: &StorageKey) -> Option<String> {
        lock(&self.objects, "objects")
            .get(key)
            .map(|(content_type, _)| content_type.clone())
    }

    pub fn object_count(&self) -> usize {
        lock(&self.objects, "objects").len()
    }

    pub fn deleted(&self) -> Vec<StorageKey> {
        lock(&self.deleted, "deleted").clone()
    }
}

#[async_trait]
impl ObjectStore for RecordingObjectStore {
    async fn put(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        scope: GroupId,
    ) -> Result<StorageKey, ObjectStoreError> {
        let key = StorageKey::new(format!("groups/{scope}/{}", Uuid::new_v4()))
            .map_err(|err| ObjectStoreError::rejected(err.to_string()))?;
        lock(&self.objects, "objects").insert(key.clone(), (content_type.to_owned(), bytes));
        Ok(key)
    }

    async fn signed_url(
        &self,
        key: &StorageKey,
        ttl: Duration,
    ) -> Result<String, ObjectStoreError> {
        Ok(format!("https://objects.test/{key}?expires={}", ttl.as_secs()))
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), ObjectStoreError> {
        if lock(&self.failing_deletes, "delete failures").contains(key) {
            return Err(ObjectStoreError::unavailable("delete failed"));
        }
        lock(&self.objects, "objects").remove(key);
        lock(&self.deleted, "deleted").push(key.clone());
        Ok(())
    }
}
