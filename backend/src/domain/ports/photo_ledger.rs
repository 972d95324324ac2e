//! Port for durable photo records, including edit placeholders.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{CorrelationId, EditCompletion, GroupId, Photo, PhotoId};

use super::LedgerError;

/// Key used to find the placeholder an edit response belongs to.
///
/// The correlation id alone identifies the placeholder. When the response
/// echoes the original photo id, it must match as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditLookup {
    pub correlation_id: CorrelationId,
    pub original_photo_id: Option<PhotoId>,
}

impl EditLookup {
    pub fn matches(&self, photo: &Photo) -> bool {
        photo.is_edited()
            && photo.correlation_id() == Some(self.correlation_id)
            && self
                .original_photo_id
                .is_none_or(|original| photo.original_photo_id() == Some(original))
    }
}

/// Row count and byte total over every photo row, soft-deleted included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhotoUsage {
    pub photos: u64,
    pub stored_bytes: u64,
}

/// Durable store for [`Photo`] records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PhotoLedger: Send + Sync {
    async fn insert(&self, photo: &Photo) -> Result<(), LedgerError>;

    /// Photo by id, excluding soft-deleted rows.
    async fn find_live(&self, id: PhotoId) -> Result<Option<Photo>, LedgerError>;

    /// Photo by id, including soft-deleted rows.
    async fn find_any(&self, id: PhotoId) -> Result<Option<Photo>, LedgerError>;

    /// Live photos of a group, oldest first.
    async fn list_live_for_group(&self, group_id: GroupId) -> Result<Vec<Photo>, LedgerError>;

    /// Every photo row of a group, soft-deleted ones included.
    async fn list_all_for_group(&self, group_id: GroupId) -> Result<Vec<Photo>, LedgerError>;

    /// Edited photo matching `lookup`, whatever its status.
    async fn find_edit(&self, lookup: &EditLookup) -> Result<Option<Photo>, LedgerError>;

    /// Apply `completion` to the placeholder matching `lookup` if, and only
    /// if, it is still pending.
    ///
    /// The read and the write happen under a row lock, so of two concurrent
    /// callers exactly one receives `Some`.
    async fn complete_pending_edit(
        &self,
        lookup: &EditLookup,
        completion: &EditCompletion,
    ) -> Result<Option<Photo>, LedgerError>;

    /// Set the deletion timestamp. Returns `false` when the photo is missing
    /// or already soft-deleted.
    async fn soft_delete(&self, id: PhotoId, at: DateTime<Utc>) -> Result<bool, LedgerError>;

    /// Remove the row. Returns `false` when it was already gone.
    async fn delete(&self, id: PhotoId) -> Result<bool, LedgerError>;

    /// Totals across all groups.
    async fn usage(&self) -> Result<PhotoUsage, LedgerError>;

    /// Fail every placeholder still pending that was created before
    /// `created_before`. Returns the number of placeholders changed.
    async fn expire_pending_edits(
        &self,
        created_before: DateTime<Utc>,
        error: &str,
    ) -> Result<u64, LedgerError>;
}
