//! PostgreSQL-backed [`GroupLedger`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::ports::{GroupLedger, LedgerError};
use crate::domain::{Group, GroupDraft, GroupId, ShareCode, UserId};

use super::diesel_basic_error_mapping::{corrupt_row, map_diesel_error, map_pool_error};
use super::models::GroupRow;
use super::pool::DbPool;
use super::schema::{groups, photos};

#[derive(Clone)]
pub struct DieselGroupLedger {
    pool: DbPool,
}

impl DieselGroupLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_group(row: GroupRow) -> Result<Group, LedgerError> {
    let share_code = ShareCode::new(row.share_code).map_err(|err| corrupt_row("groups", err))?;
    Group::new(GroupDraft {
        id: GroupId::from_uuid(row.id),
        name: row.name,
        share_code,
        creator_id: UserId::from_uuid(row.creator_id),
        member_ids: row.member_ids.into_iter().map(UserId::from_uuid).collect(),
        is_active: row.is_active,
        created_at: row.created_at,
        expiry_date: row.expiry_date,
        deletion_date: row.deletion_date,
    })
    .map_err(|err| corrupt_row("groups", err))
}

fn group_to_row(group: &Group) -> GroupRow {
    GroupRow {
        id: *group.id().as_uuid(),
        name: group.name().to_owned(),
        share_code: group.share_code().as_str().to_owned(),
        creator_id: *group.creator_id().as_uuid(),
        member_ids: group.member_ids().iter().map(|id| *id.as_uuid()).collect(),
        is_active: group.is_active(),
        created_at: group.created_at(),
        expiry_date: group.expiry_date(),
        deletion_date: group.deletion_date(),
    }
}

fn rows_to_groups(rows: Vec<GroupRow>) -> Result<Vec<Group>, LedgerError> {
    rows.into_iter().map(row_to_group).collect()
}

#[async_trait]
impl GroupLedger for DieselGroupLedger {
    async fn insert(&self, group: &Group) -> Result<(), LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(groups::table)
            .values(group_to_row(group))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }

    async fn find_by_id(&self, id: GroupId) -> Result<Option<Group>, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = groups::table
            .find(*id.as_uuid())
            .select(GroupRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_group).transpose()
    }

    async fn find_by_share_code(&self, code: &ShareCode) -> Result<Option<Group>, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = groups::table
            .filter(groups::share_code.eq(code.as_str()))
            .select(GroupRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_group).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Group>, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows = groups::table
            .order_by(groups::created_at.desc())
            .select(GroupRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows_to_groups(rows)
    }

    async fn list_for_member(&self, user_id: &UserId) -> Result<Vec<Group>, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows = groups::table
            .filter(groups::member_ids.contains(vec![*user_id.as_uuid()]))
            .order_by(groups::created_at.desc())
            .select(GroupRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows_to_groups(rows)
    }

    async fn add_member(
        &self,
        id: GroupId,
        user_id: &UserId,
    ) -> Result<Option<Group>, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let group_uuid = *id.as_uuid();
        let member = *user_id.as_uuid();

        // Row lock serializes concurrent joins to the same group.
        let row = conn
            .transaction::<_, DieselError, _>(|conn| {
                async move {
                    let Some(mut row) = groups::table
                        .find(group_uuid)
                        .select(GroupRow::as_select())
                        .for_update()
                        .first(conn)
                        .await
                        .optional()?
                    else {
                        return Ok(None);
                    };
                    if row.member_ids.contains(&member) {
                        return Ok(Some(row));
                    }
                    row.member_ids.push(member);
                    diesel::update(groups::table.find(group_uuid))
                        .set(groups::member_ids.eq(row.member_ids.clone()))
                        .execute(conn)
                        .await?;
                    Ok(Some(row))
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;
        row.map(row_to_group).transpose()
    }

    async fn deactivate(&self, id: GroupId) -> Result<bool, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = diesel::update(groups::table.find(*id.as_uuid()))
            .set(groups::is_active.eq(false))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(updated > 0)
    }

    async fn list_due_for_deletion(&self, now: DateTime<Utc>) -> Result<Vec<Group>, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows = groups::table
            .filter(groups::deletion_date.lt(now))
            .order_by(groups::deletion_date.asc())
            .select(GroupRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows_to_groups(rows)
    }

    async fn purge(&self, id: GroupId) -> Result<bool, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let group_uuid = *id.as_uuid();
        let (photo_rows, group_rows) = conn
            .transaction::<_, DieselError, _>(|conn| {
                async move {
                    let photo_rows =
                        diesel::delete(photos::table.filter(photos::group_id.eq(group_uuid)))
                            .execute(conn)
                            .await?;
                    let group_rows = diesel::delete(groups::table.find(group_uuid))
                        .execute(conn)
                        .await?;
                    Ok((photo_rows, group_rows))
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;
        debug!(group_id = %id, photo_rows, "group rows purged");
        Ok(group_rows > 0)
    }
}
