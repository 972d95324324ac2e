//! Group use cases: create, join, read, list, and logical delete.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::access_policy::{self, GroupAction};
use super::ports::{GroupLedger, LedgerError};
use super::{DomainError, DomainResult, Group, GroupId, GroupValidationError, ShareCode, UserId};

/// Attempts at finding an unused share code before giving up.
pub const SHARE_CODE_ATTEMPTS: usize = 5;

/// Group use cases backed by a [`GroupLedger`].
#[derive(Clone)]
pub struct GroupService {
    groups: Arc<dyn GroupLedger>,
}

fn invalid_group(err: GroupValidationError) -> DomainError {
    DomainError::invalid_request(format!("invalid group: {err}"))
}

impl GroupService {
    pub fn new(groups: Arc<dyn GroupLedger>) -> Self {
        Self { groups }
    }

    /// Open a group owned by `creator`.
    ///
    /// Share codes come from the thread-local CSPRNG; a unique-constraint clash triggers a retry
    /// with a fresh code, up to [`SHARE_CODE_ATTEMPTS`] times.
    pub async fn create_group(
        &self,
        name: &str,
        creator: &UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Group> {
        for attempt in 1..=SHARE_CODE_ATTEMPTS {
            let code = ShareCode::generate(&mut rand::thread_rng());
            let group = Group::open(name, code, creator.clone(), now).map_err(invalid_group)?;
            match self.groups.insert(&group).await {
                Ok(()) => {
                    info!(group_id = %group.id(), creator_id = %creator, "group created");
                    return Ok(group);
                }
                Err(LedgerError::Conflict { message }) => {
                    warn!(attempt, %message, "share code collision, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(DomainError::conflict("could not allocate a unique share code"))
    }

    /// Add `user` to the group behind `code`.
    pub async fn join_group(
        &self,
        code: &str,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Group> {
        let code = ShareCode::new(code).map_err(invalid_group)?;
        let group = self
            .groups
            .find_by_share_code(&code)
            .await?
            .ok_or_else(|| DomainError::not_found("no group uses this share code"))?;

        if let Some(denial) = access_policy::mutate_denial(&group, user, GroupAction::Join, now) {
            return Err(DomainError::forbidden(denial.message()));
        }
        if group.is_member(user) {
            debug!(group_id = %group.id(), user_id = %user, "already a member");
            return Ok(group);
        }

        let updated = self
            .groups
            .add_member(group.id(), user)
            .await?
            .ok_or_else(|| DomainError::not_found("group no longer exists"))?;
        info!(group_id = %updated.id(), user_id = %user, "member joined");
        Ok(updated)
    }

    pub async fn get_group(
        &self,
        id: GroupId,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Group> {
        let group = self
            .groups
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("group {id} not found")))?;
        match access_policy::read_denial(&group, user, now) {
            None => Ok(group),
            Some(denial) => Err(DomainError::forbidden(denial.message())),
        }
    }

    /// Groups `user` belongs to and can currently read.
    pub async fn list_my_groups(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Group>> {
        let groups = self.groups.list_for_member(user).await?;
        Ok(groups
            .into_iter()
            .filter(|group| access_policy::can_read(group, user, now))
            .collect())
    }

    /// Logically delete a group. Missing or already deleted groups succeed
    /// silently; anyone but the creator is refused.
    pub async fn delete_group(
        &self,
        id: GroupId,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let Some(group) = self.groups.find_by_id(id).await? else {
            debug!(group_id = %id, "delete of missing group ignored");
            return Ok(());
        };
        if !group.is_active() {
            return Ok(());
        }
        if let Some(denial) = access_policy::mutate_denial(&group, user, GroupAction::Delete, now) {
            return Err(DomainError::forbidden(denial.message()));
        }
        self.groups.deactivate(id).await?;
        info!(group_id = %id, "group deleted by creator");
        Ok(())
    }
}

#[cfg(test)]
#[path = "group_service_tests.rs"]
mod tests;
