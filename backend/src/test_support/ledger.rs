//! In-memory ledger implementing both the group and photo ports.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ports::{EditLookup, GroupLedger, LedgerError, PhotoLedger, PhotoUsage};
use crate::domain::{
    EditCompletion, EditStatus, Group, GroupId, Photo, PhotoId, ShareCode, UserId,
};

use super::lock;

#[derive(Default)]
struct State {
    groups: HashMap<GroupId, Group>,
    photos: Vec<Photo>,
}

/// Ledger double with switchable failures.
#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<State>,
    photos_offline: AtomicBool,
    failing_purges: Mutex<HashSet<GroupId>>,
    soft_deletes: AtomicUsize,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(self, group: Group) -> Self {
        lock(&self.state, "ledger").groups.insert(group.id(), group);
        self
    }

    pub fn with_photo(self, photo: Photo) -> Self {
        lock(&self.state, "ledger").photos.push(photo);
        self
    }

    /// Make every photo ledger call fail with a connection error.
    pub fn set_photos_offline(&self, offline: bool) {
        self.photos_offline.store(offline, Ordering::SeqCst);
    }

    pub fn fail_purge_of(&self, id: GroupId) {
        lock(&self.failing_purges, "purge failures").insert(id);
    }

    pub fn allow_purge_of(&self, id: GroupId) {
        lock(&self.failing_purges, "purge failures").remove(&id);
    }

    pub fn group(&self, id: GroupId) -> Option<Group> {
        lock(&self.state, "ledger").groups.get(&id).cloned()
    }

    pub fn photo(&self, id: PhotoId) -> Option<Photo> {
        lock(&self.state, "ledger")
            .photos
            .iter()
            .find(|photo| photo.id() == id)
            .cloned()
    }

    pub fn photos(&self) -> Vec<Photo> {
        lock(&self.state, "ledger").photos.clone()
    }

    /// Successful soft deletions so far.
    pub fn soft_delete_count(&self) -> usize {
        self.soft_deletes.load(Ordering::SeqCst)
    }

    fn photo_gate(&self) -> Result<(), LedgerError> {
        if self.photos_offline.load(Ordering::SeqCst) {
            return Err(LedgerError::connection("photo ledger offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl GroupLedger for InMemoryLedger {
    async fn insert(&self, group: &Group) -> Result<(), LedgerError> {
        let mut state = lock(&self.state, "ledger");
        if state
            .groups
            .values()
            .any(|existing| existing.share_code() == group.share_code())
        {
            return Err(LedgerError::conflict("share code already in use"));
        }
        state.groups.insert(group.id(), group.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: GroupId) -> Result<Option<Group>, LedgerError> {
        Ok(self.group(id))
    }

    async fn find_by_share_code(&self, code: &ShareCode) -> Result<Option<Group>, LedgerError> {
        Ok(lock(&self.state, "ledger")
            .groups
            .values()
            .find(|group| group.share_code() == code)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<Group>, LedgerError> {
        let mut groups: Vec<Group> = lock(&self.state, "ledger").groups.values().cloned().collect();
        groups.sort_by_key(|group| std::cmp::Reverse(group.created_at()));
        Ok(groups)
    }

    async fn list_for_member(&self, user_id: &UserId) -> Result<Vec<Group>, LedgerError> {
        let mut groups: Vec<Group> = lock(&self.state, "ledger")
            .groups
            .values()
            .filter(|group| group.is_member(user_id))
            .cloned()
            .collect();
        groups.sort_by_key(|group| std::cmp::Reverse(group.created_at()));
        Ok(groups)
    }

    async fn add_member(
        &self,
        id: GroupId,
        user_id: &UserId,
    ) -> Result<Option<Group>, LedgerError> {
        let mut state = lock(&self.state, "ledger");
        let Some(group) = state.groups.remove(&id) else {
            return Ok(None);
        };
        let updated = group.with_member(user_id.clone());
        state.groups.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn deactivate(&self, id: GroupId) -> Result<bool, LedgerError> {
        let mut state = lock(&self.state, "ledger");
        let Some(group) = state.groups.remove(&id) else {
            return Ok(false);
        };
        state.groups.insert(id, group.deactivated());
        Ok(true)
    }

    async fn list_due_for_deletion(&self, now: DateTime<Utc>) -> Result<Vec<Group>, LedgerError> {
        Ok(lock(&self.state, "ledger")
            .groups
            .values()
            .filter(|group| group.deletion_date() < now)
            .cloned()
            .collect())
    }

    async fn purge(&self, id: GroupId) -> Result<bool, LedgerError> {
        if lock(&self.failing_purges, "purge failures").contains(&id) {
            return Err(LedgerError::query("purge failed"));
        }
        let mut state = lock(&self.state, "ledger");
        state.photos.retain(|photo| photo.group_id() != id);
        Ok(state.groups.remove(&id).is_some())
    }
}

#[async_trait]
impl PhotoLedger for InMemoryLedger {
    async fn insert(&self, photo: &Photo) -> Result<(), LedgerError> {
        self.photo_gate()?;
        lock(&self.state, "ledger").photos.push(photo.clone());
        Ok(())
    }

    async fn find_live(&self, id: PhotoId) -> Result<Option<Photo>, LedgerError> {
        self.photo_gate()?;
        Ok(self.photo(id).filter(|photo| !photo.is_soft_deleted()))
    }

    async fn find_any(&self, id: PhotoId) -> Result<Option<Photo>, LedgerError> {
        self.photo_gate()?;
        Ok(self.photo(id))
    }

    async fn list_live_for_group(&self, group_id: GroupId) -> Result<Vec<Photo>, LedgerError> {
        self.photo_gate()?;
        Ok(lock(&self.state, "ledger")
            .photos
            .iter()
            .filter(|photo| photo.group_id() == group_id && !photo.is_soft_deleted())
            .cloned()
            .collect())
    }

    async fn list_all_for_group(&self, group_id: GroupId) -> Result<Vec<Photo>, LedgerError> {
        self.photo_gate()?;
        Ok(lock(&self.state, "ledger")
            .photos
            .iter()
            .filter(|photo| photo.group_id() == group_id)
            .cloned()
            .collect())
    }

    async fn find_edit(&self, lookup: &EditLookup) -> Result<Option<Photo>, LedgerError> {
        self.photo_gate()?;
        Ok(lock(&self.state, "ledger")
            .photos
            .iter()
            .find(|photo| lookup.matches(photo))
            .cloned())
    }

    async fn complete_pending_edit(
        &self,
        lookup: &EditLookup,
        completion: &EditCompletion,
    ) -> Result<Option<Photo>, LedgerError> {
        self.photo_gate()?;
        let mut state = lock(&self.state, "ledger");
        let Some(slot) = state.photos.iter_mut().find(|photo| lookup.matches(photo)) else {
            return Ok(None);
        };
        let Some(completed) = slot.complete_edit(completion) else {
            return Ok(None);
        };
        *slot = completed.clone();
        Ok(Some(completed))
    }

    async fn soft_delete(&self, id: PhotoId, at: DateTime<Utc>) -> Result<bool, LedgerError> {
        self.photo_gate()?;
        let mut state = lock(&self.state, "ledger");
        let Some(slot) = state
            .photos
            .iter_mut()
            .find(|photo| photo.id() == id && !photo.is_soft_deleted())
        else {
            return Ok(false);
        };
        *slot = slot.clone().soft_deleted(at);
        self.soft_deletes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn delete(&self, id: PhotoId) -> Result<bool, LedgerError> {
        self.photo_gate()?;
        let mut state = lock(&self.state, "ledger");
        let before = state.photos.len();
        state.photos.retain(|photo| photo.id() != id);
        Ok(state.photos.len() < before)
    }

    async fn usage(&self) -> Result<PhotoUsage, LedgerError> {
        self.photo_gate()?;
        let state = lock(&self.state, "ledger");
        Ok(PhotoUsage {
            photos: state.photos.len() as u64,
            stored_bytes: state.photos.iter().map(Photo::size_bytes).sum(),
        })
    }

    async fn expire_pending_edits(
        &self,
        created_before: DateTime<Utc>,
        error: &str,
    ) -> Result<u64, LedgerError> {
        self.photo_gate()?;
        let completion = EditCompletion::Failed {
            error: error.to_owned(),
        };
        let mut expired = 0;
        for slot in lock(&self.state, "ledger").photos.iter_mut() {
            let pending = slot.edit_status() == Some(EditStatus::Pending);
            if !pending || slot.created_at() >= created_before {
                continue;
            }
            if let Some(failed) = slot.complete_edit(&completion) {
                *slot = failed;
                expired += 1;
            }
        }
        Ok(expired)
    }
}
