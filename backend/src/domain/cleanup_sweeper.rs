//! Retention enforcement.
//!
//! Once a group passes its deletion date, its photo bytes are removed from the
//! object store and its rows are purged from the ledger. Each sweep also
//! expires edit placeholders that never received a response.
//!
//! A failure on one group is logged and counted, and the sweep moves on.
//! Groups that fail stay overdue and are retried on the next sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use super::ports::{GroupLedger, ObjectStore, PhotoLedger};
use super::{DomainError, DomainResult, Group};

/// Error recorded on placeholders that outlive the pending-edit TTL.
pub const EXPIRED_EDIT_ERROR: &str = "edit request expired";

/// Sweep cadence and placeholder expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperConfig {
    pub interval: Duration,
    pub pending_edit_ttl: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(24 * 60 * 60),
            pending_edit_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub purged_groups: usize,
    pub failed_groups: usize,
    pub deleted_objects: usize,
    pub expired_edits: u64,
}

pub struct CleanupSweeper {
    groups: Arc<dyn GroupLedger>,
    photos: Arc<dyn PhotoLedger>,
    objects: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    config: SweeperConfig,
}

impl CleanupSweeper {
    pub fn new(
        groups: Arc<dyn GroupLedger>,
        photos: Arc<dyn PhotoLedger>,
        objects: Arc<dyn ObjectStore>,
        clock: Arc<dyn Clock>,
        config: SweeperConfig,
    ) -> Self {
        Self {
            groups,
            photos,
            objects,
            clock,
            config,
        }
    }

    /// Run one sweep.
    ///
    /// Only the initial overdue-group query can fail the sweep as a whole.
    pub async fn sweep(&self) -> DomainResult<SweepReport> {
        let now = self.clock.utc();
        info!(%now, "cleanup sweep started");
        let mut report = SweepReport::default();

        let overdue = self.groups.list_due_for_deletion(now).await?;
        for group in overdue {
            match self.purge_group(&group).await {
                Ok(deleted) => {
                    report.purged_groups += 1;
                    report.deleted_objects += deleted;
                }
                Err(err) => {
                    report.failed_groups += 1;
                    error!(
                        group_id = %group.id(),
                        error = %err,
                        "group purge failed; continuing"
                    );
                }
            }
        }

        match self.expire_stale_edits(now).await {
            Ok(expired) => report.expired_edits = expired,
            Err(err) => warn!(error = %err, "pending edit expiry failed"),
        }

        info!(
            purged_groups = report.purged_groups,
            failed_groups = report.failed_groups,
            deleted_objects = report.deleted_objects,
            expired_edits = report.expired_edits,
            "cleanup sweep finished"
        );
        Ok(report)
    }

    /// Remove `group`'s objects, then its rows. Returns the objects deleted.
    ///
    /// Pending placeholders own no object and are skipped.
    pub async fn purge_group(&self, group: &Group) -> DomainResult<usize> {
        let photos = self.photos.list_all_for_group(group.id()).await?;
        let mut deleted = 0;
        for photo in &photos {
            if photo.storage_key().is_pending_sentinel() {
                continue;
            }
            self.objects.delete(photo.storage_key()).await?;
            deleted += 1;
        }
        self.groups.purge(group.id()).await?;
        info!(group_id = %group.id(), photos = photos.len(), "group purged");
        Ok(deleted)
    }

    async fn expire_stale_edits(&self, now: DateTime<Utc>) -> DomainResult<u64> {
        let ttl = TimeDelta::from_std(self.config.pending_edit_ttl).map_err(|err| {
            DomainError::internal(format!("pending edit ttl out of range: {err}"))
        })?;
        let expired = self
            .photos
            .expire_pending_edits(now - ttl, EXPIRED_EDIT_ERROR)
            .await?;
        if expired > 0 {
            info!(expired, "expired unanswered edit requests");
        }
        Ok(expired)
    }

    /// Sweep on a fixed interval until the task is dropped.
    ///
    /// The first sweep runs immediately.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = self.sweep().await {
                error!(error = %err, "cleanup sweep aborted");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::ports::{LedgerError, MockGroupLedger};
    use crate::domain::{
        CorrelationId, EditStatus, ErrorCode, GroupDraft, GroupId, Photo, ShareCode, StorageKey,
        UserId,
    };
    use crate::test_support::{InMemoryLedger, MutableClock, RecordingObjectStore};

    #[fixture]
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 3, 0, 0)
            .single()
            .expect("valid time")
    }

    fn group_deleting_at(deletion_date: DateTime<Utc>, code: &str) -> Group {
        let creator = UserId::random();
        Group::new(GroupDraft {
            id: GroupId::random(),
            name: "Old trip".to_owned(),
            share_code: ShareCode::new(code).expect("valid code"),
            member_ids: vec![creator.clone()],
            creator_id: creator,
            is_active: true,
            created_at: deletion_date - TimeDelta::days(60),
            expiry_date: deletion_date - TimeDelta::days(30),
            deletion_date,
        })
        .expect("valid group")
    }

    fn photo_in(group: &Group, name: &str) -> Photo {
        Photo::uploaded(
            group.id(),
            StorageKey::new(format!("groups/{}/{name}", group.id())).expect("valid key"),
            name,
            "image/jpeg",
            1,
            group.creator_id().clone(),
            group.created_at(),
        )
    }

    fn sweeper(
        ledger: &Arc<InMemoryLedger>,
        objects: &Arc<RecordingObjectStore>,
        now: DateTime<Utc>,
    ) -> CleanupSweeper {
        CleanupSweeper::new(
            ledger.clone(),
            ledger.clone(),
            objects.clone(),
            Arc::new(MutableClock::new(now)),
            SweeperConfig::default(),
        )
    }

    #[rstest]
    #[tokio::test]
    async fn purges_only_groups_past_deletion_date(now: DateTime<Utc>) {
        let keep = group_deleting_at(now + TimeDelta::seconds(1), "keep0001");
        let purge = group_deleting_at(now - TimeDelta::seconds(1), "purge001");
        let kept_photo = photo_in(&keep, "a.jpg");
        let live = photo_in(&purge, "b.jpg");
        let hidden = photo_in(&purge, "c.jpg").soft_deleted(now - TimeDelta::days(40));
        let ledger = Arc::new(
            InMemoryLedger::new()
                .with_group(keep.clone())
                .with_group(purge.clone())
                .with_photo(kept_photo.clone())
                .with_photo(live.clone())
                .with_photo(hidden.clone()),
        );
        let objects = Arc::new(
            RecordingObjectStore::new()
                .with_object(kept_photo.storage_key())
                .with_object(live.storage_key())
                .with_object(hidden.storage_key()),
        );

        let report = sweeper(&ledger, &objects, now)
            .sweep()
            .await
            .expect("sweep runs");

        assert_eq!(report.purged_groups, 1);
        assert_eq!(report.deleted_objects, 2);
        assert!(ledger.group(purge.id()).is_none());
        assert!(ledger.group(keep.id()).is_some());
        assert_eq!(ledger.photos(), vec![kept_photo.clone()]);
        assert!(objects.contains(kept_photo.storage_key()));
        assert!(!objects.contains(live.storage_key()));
        assert!(!objects.contains(hidden.storage_key()));
    }

    #[rstest]
    #[tokio::test]
    async fn one_failing_group_does_not_stop_the_sweep(now: DateTime<Utc>) {
        let broken = group_deleting_at(now - TimeDelta::days(1), "broken01");
        let stuck = group_deleting_at(now - TimeDelta::days(2), "stuck001");
        let fine = group_deleting_at(now - TimeDelta::days(3), "fine0001");
        let broken_photo = photo_in(&broken, "x.jpg");
        let ledger = Arc::new(
            InMemoryLedger::new()
                .with_group(broken.clone())
                .with_group(stuck.clone())
                .with_group(fine.clone())
                .with_photo(broken_photo.clone()),
        );
        let objects = Arc::new(RecordingObjectStore::new().with_object(broken_photo.storage_key()));
        objects.fail_delete_of(broken_photo.storage_key());
        ledger.fail_purge_of(stuck.id());

        let report = sweeper(&ledger, &objects, now)
            .sweep()
            .await
            .expect("sweep runs");

        assert_eq!(report.purged_groups, 1);
        assert_eq!(report.failed_groups, 2);
        assert!(ledger.group(fine.id()).is_none());
        assert!(ledger.group(broken.id()).is_some());
        assert!(ledger.group(stuck.id()).is_some());
    }

    #[rstest]
    #[tokio::test]
    async fn rerun_after_partial_failure_finishes_the_job(now: DateTime<Utc>) {
        let group = group_deleting_at(now - TimeDelta::days(1), "again001");
        let photo = photo_in(&group, "x.jpg");
        let ledger = Arc::new(
            InMemoryLedger::new()
                .with_group(group.clone())
                .with_photo(photo.clone()),
        );
        let objects = Arc::new(RecordingObjectStore::new().with_object(photo.storage_key()));
        ledger.fail_purge_of(group.id());
        let first = sweeper(&ledger, &objects, now).sweep().await.expect("first");
        assert_eq!(first.failed_groups, 1);
        assert!(ledger.group(group.id()).is_some());

        ledger.allow_purge_of(group.id());
        let second = sweeper(&ledger, &objects, now).sweep().await.expect("second");
        assert_eq!(second.purged_groups, 1);
        assert!(ledger.group(group.id()).is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn placeholders_are_skipped_in_object_deletion(now: DateTime<Utc>) {
        let group = group_deleting_at(now - TimeDelta::days(1), "pend0001");
        let original = photo_in(&group, "x.jpg");
        let placeholder = Photo::edit_placeholder(
            &original,
            group.creator_id().clone(),
            CorrelationId::generate(),
            group.created_at(),
        );
        let ledger = Arc::new(
            InMemoryLedger::new()
                .with_group(group.clone())
                .with_photo(original.clone())
                .with_photo(placeholder),
        );
        let objects = Arc::new(RecordingObjectStore::new().with_object(original.storage_key()));

        let report = sweeper(&ledger, &objects, now).sweep().await.expect("sweep");

        assert_eq!(report.deleted_objects, 1);
        assert_eq!(objects.deleted(), vec![original.storage_key().clone()]);
    }

    #[rstest]
    #[tokio::test]
    async fn stale_pending_edits_expire(now: DateTime<Utc>) {
        let group = group_deleting_at(now + TimeDelta::days(40), "live0001");
        let original = photo_in(&group, "x.jpg");
        let stale = Photo::edit_placeholder(
            &original,
            group.creator_id().clone(),
            CorrelationId::generate(),
            now - TimeDelta::hours(25),
        );
        let fresh = Photo::edit_placeholder(
            &original,
            group.creator_id().clone(),
            CorrelationId::generate(),
            now - TimeDelta::hours(1),
        );
        let ledger = Arc::new(
            InMemoryLedger::new()
                .with_group(group)
                .with_photo(original)
                .with_photo(stale.clone())
                .with_photo(fresh.clone()),
        );
        let objects = Arc::new(RecordingObjectStore::new());

        let report = sweeper(&ledger, &objects, now).sweep().await.expect("sweep");

        assert_eq!(report.expired_edits, 1);
        let stale = ledger.photo(stale.id()).expect("stale kept");
        assert_eq!(stale.edit_status(), Some(EditStatus::Failed));
        assert_eq!(stale.edit_error(), Some(EXPIRED_EDIT_ERROR));
        let fresh = ledger.photo(fresh.id()).expect("fresh kept");
        assert_eq!(fresh.edit_status(), Some(EditStatus::Pending));
    }

    #[rstest]
    #[tokio::test]
    async fn overdue_query_failure_aborts_sweep(now: DateTime<Utc>) {
        let mut groups = MockGroupLedger::new();
        groups
            .expect_list_due_for_deletion()
            .returning(|_| Err(LedgerError::connection("refused")));
        let ledger = Arc::new(InMemoryLedger::new());
        let sweeper = CleanupSweeper::new(
            Arc::new(groups),
            ledger,
            Arc::new(RecordingObjectStore::new()),
            Arc::new(MutableClock::new(now)),
            SweeperConfig::default(),
        );

        let err = sweeper.sweep().await.expect_err("query failure");
        assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
    }
}
