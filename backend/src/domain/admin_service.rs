//! Operator use cases: list every group, purge one now, report totals.
//!
//! Identity is resolved outside this crate, so the service is handed the
//! set of administrator ids when it is built and refuses everyone else.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::cleanup_sweeper::CleanupSweeper;
use super::ports::{GroupLedger, PhotoLedger};
use super::{DomainError, DomainResult, Group, GroupId, UserId};

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Totals reported to operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemStats {
    pub total_groups: usize,
    pub active_groups: usize,
    /// Distinct users across every member set.
    pub distinct_members: usize,
    /// Photo rows, soft-deleted and pending ones included.
    pub total_photos: u64,
    pub stored_bytes: u64,
}

impl SystemStats {
    /// Stored bytes in whole mebibytes, rounded to nearest.
    pub fn storage_mib(&self) -> u64 {
        (self.stored_bytes + BYTES_PER_MIB / 2) / BYTES_PER_MIB
    }
}

#[derive(Clone)]
pub struct AdminService {
    groups: Arc<dyn GroupLedger>,
    photos: Arc<dyn PhotoLedger>,
    sweeper: Arc<CleanupSweeper>,
    admins: Arc<HashSet<UserId>>,
}

impl AdminService {
    pub fn new(
        groups: Arc<dyn GroupLedger>,
        photos: Arc<dyn PhotoLedger>,
        sweeper: Arc<CleanupSweeper>,
        admins: impl IntoIterator<Item = UserId>,
    ) -> Self {
        Self {
            groups,
            photos,
            sweeper,
            admins: Arc::new(admins.into_iter().collect()),
        }
    }

    fn authorize(&self, user: &UserId) -> DomainResult<()> {
        if self.admins.contains(user) {
            return Ok(());
        }
        warn!(user_id = %user, "admin operation refused");
        Err(DomainError::forbidden("admin access required"))
    }

    /// Every group regardless of phase or membership, newest first.
    pub async fn list_all_groups(&self, admin: &UserId) -> DomainResult<Vec<Group>> {
        self.authorize(admin)?;
        Ok(self.groups.list_all().await?)
    }

    /// Hard-delete a group, its photo rows and their objects immediately.
    ///
    /// Returns `false` when the group does not exist.
    pub async fn purge_group(&self, id: GroupId, admin: &UserId) -> DomainResult<bool> {
        self.authorize(admin)?;
        let Some(group) = self.groups.find_by_id(id).await? else {
            debug!(group_id = %id, "admin purge of missing group ignored");
            return Ok(false);
        };
        let deleted_objects = self.sweeper.purge_group(&group).await?;
        info!(group_id = %id, admin_id = %admin, deleted_objects, "group purged by admin");
        Ok(true)
    }

    pub async fn system_stats(&self, admin: &UserId) -> DomainResult<SystemStats> {
        self.authorize(admin)?;
        let groups = self.groups.list_all().await?;
        let usage = self.photos.usage().await?;
        let distinct_members = groups
            .iter()
            .flat_map(Group::member_ids)
            .collect::<HashSet<_>>()
            .len();
        Ok(SystemStats {
            total_groups: groups.len(),
            active_groups: groups.iter().filter(|group| group.is_active()).count(),
            distinct_members,
            total_photos: usage.photos,
            stored_bytes: usage.stored_bytes,
        })
    }
}

#[cfg(test)]
#[path = "admin_service_tests.rs"]
mod tests;
