//! Port for durable group records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Group, GroupId, ShareCode, UserId};

use super::LedgerError;

/// Durable store for [`Group`] aggregates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupLedger: Send + Sync {
    /// Insert a new group.
    ///
    /// Returns [`LedgerError::Conflict`] when the share code is taken.
    async fn insert(&self, group: &Group) -> Result<(), LedgerError>;

    async fn find_by_id(&self, id: GroupId) -> Result<Option<Group>, LedgerError>;

    async fn find_by_share_code(&self, code: &ShareCode) -> Result<Option<Group>, LedgerError>;

    /// Every group, newest first.
    async fn list_all(&self) -> Result<Vec<Group>, LedgerError>;

    /// Groups whose member set contains `user_id`, newest first.
    async fn list_for_member(&self, user_id: &UserId) -> Result<Vec<Group>, LedgerError>;

    /// Atomically add `user_id` to the member set.
    ///
    /// Returns the updated group, or `None` when the group does not exist.
    /// Adding an existing member leaves the set unchanged.
    async fn add_member(
        &self,
        id: GroupId,
        user_id: &UserId,
    ) -> Result<Option<Group>, LedgerError>;

    /// Clear the active flag. Returns `false` when the group does not exist.
    async fn deactivate(&self, id: GroupId) -> Result<bool, LedgerError>;

    /// Groups with `deletion_date < now`.
    async fn list_due_for_deletion(&self, now: DateTime<Utc>) -> Result<Vec<Group>, LedgerError>;

    /// Remove the group and every photo row it owns in one transaction.
    ///
    /// Returns `false` when the group was already gone.
    async fn purge(&self, id: GroupId) -> Result<bool, LedgerError>;
}
