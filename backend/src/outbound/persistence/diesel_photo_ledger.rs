//! PostgreSQL-backed [`PhotoLedger`].
//!
//! Edit finalization locks the placeholder row, re-checks that it is still
//! pending and rewrites it in the same transaction. Duplicate responses
//! racing on one placeholder queue on the lock; the later one finds a
//! terminal row and writes nothing.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::{count_star, sql};
use diesel::prelude::*;
use diesel::sql_types::BigInt;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};

use crate::domain::ports::{EditLookup, LedgerError, PhotoLedger, PhotoUsage};
use crate::domain::{
    CorrelationId, EditCompletion, EditStatus, GroupId, Photo, PhotoDraft, PhotoId, StorageKey,
    UserId,
};

use super::diesel_basic_error_mapping::{corrupt_row, map_diesel_error, map_pool_error};
use super::models::{EditCompletionUpdate, PhotoRow};
use super::pool::DbPool;
use super::schema::photos;

#[derive(Clone)]
pub struct DieselPhotoLedger {
    pool: DbPool,
}

impl DieselPhotoLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn size_to_db(size: u64) -> Result<i64, LedgerError> {
    i64::try_from(size).map_err(|_| LedgerError::query(format!("photo size {size} out of range")))
}

fn row_to_photo(row: PhotoRow) -> Result<Photo, LedgerError> {
    let corrupt = |err: &dyn std::fmt::Display| corrupt_row("photos", err);
    let size_bytes = u64::try_from(row.size_bytes).map_err(|err| corrupt(&err))?;
    let storage_key = StorageKey::new(row.storage_key).map_err(|err| corrupt(&err))?;
    let edit_status = row
        .edit_status
        .as_deref()
        .map(EditStatus::from_str)
        .transpose()
        .map_err(|err| corrupt(&err))?;
    Photo::new(PhotoDraft {
        id: PhotoId::from_uuid(row.id),
        group_id: GroupId::from_uuid(row.group_id),
        storage_key,
        filename: row.filename,
        original_name: row.original_name,
        mime_type: row.mime_type,
        size_bytes,
        uploader_id: UserId::from_uuid(row.uploader_id),
        is_edited: row.is_edited,
        original_photo_id: row.original_photo_id.map(PhotoId::from_uuid),
        correlation_id: row.correlation_id.map(CorrelationId::from_uuid),
        edit_status,
        edit_error: row.edit_error,
        created_at: row.created_at,
        deleted_at: row.deleted_at,
    })
    .map_err(|err| corrupt(&err))
}

fn photo_to_row(photo: &Photo) -> Result<PhotoRow, LedgerError> {
    Ok(PhotoRow {
        id: *photo.id().as_uuid(),
        group_id: *photo.group_id().as_uuid(),
        storage_key: photo.storage_key().as_str().to_owned(),
        filename: photo.filename().to_owned(),
        original_name: photo.original_name().to_owned(),
        mime_type: photo.mime_type().to_owned(),
        size_bytes: size_to_db(photo.size_bytes())?,
        uploader_id: *photo.uploader_id().as_uuid(),
        is_edited: photo.is_edited(),
        original_photo_id: photo.original_photo_id().map(|id| *id.as_uuid()),
        correlation_id: photo.correlation_id().map(|id| *id.as_uuid()),
        edit_status: photo.edit_status().map(|status| status.as_str().to_owned()),
        edit_error: photo.edit_error().map(str::to_owned),
        created_at: photo.created_at(),
        deleted_at: photo.deleted_at(),
    })
}

fn rows_to_photos(rows: Vec<PhotoRow>) -> Result<Vec<Photo>, LedgerError> {
    rows.into_iter().map(row_to_photo).collect()
}

/// Outcome of the locked read inside [`DieselPhotoLedger::complete_pending_edit`].
enum Finalize {
    Missing,
    NotPending,
    Applied(PhotoRow),
}

#[async_trait]
impl PhotoLedger for DieselPhotoLedger {
    async fn insert(&self, photo: &Photo) -> Result<(), LedgerError> {
        let row = photo_to_row(photo)?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(photos::table)
            .values(row)
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }

    async fn find_live(&self, id: PhotoId) -> Result<Option<Photo>, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = photos::table
            .find(*id.as_uuid())
            .filter(photos::deleted_at.is_null())
            .select(PhotoRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_photo).transpose()
    }

    async fn find_any(&self, id: PhotoId) -> Result<Option<Photo>, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = photos::table
            .find(*id.as_uuid())
            .select(PhotoRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_photo).transpose()
    }

    async fn list_live_for_group(&self, group_id: GroupId) -> Result<Vec<Photo>, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows = photos::table
            .filter(photos::group_id.eq(*group_id.as_uuid()))
            .filter(photos::deleted_at.is_null())
            .order_by(photos::created_at.asc())
            .select(PhotoRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows_to_photos(rows)
    }

    async fn list_all_for_group(&self, group_id: GroupId) -> Result<Vec<Photo>, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows = photos::table
            .filter(photos::group_id.eq(*group_id.as_uuid()))
            .order_by(photos::created_at.asc())
            .select(PhotoRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows_to_photos(rows)
    }

    async fn find_edit(&self, lookup: &EditLookup) -> Result<Option<Photo>, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = photos::table
            .filter(photos::correlation_id.eq(*lookup.correlation_id.as_uuid()))
            .filter(photos::is_edited.eq(true))
            .select(PhotoRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        let photo = row.map(row_to_photo).transpose()?;
        Ok(photo.filter(|photo| lookup.matches(photo)))
    }

    async fn complete_pending_edit(
        &self,
        lookup: &EditLookup,
        completion: &EditCompletion,
    ) -> Result<Option<Photo>, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let lookup = *lookup;
        let completion = completion.clone();

        let outcome = conn
            .transaction::<_, LedgerError, _>(|conn| {
                async move {
                    let locked = photos::table
                        .filter(photos::correlation_id.eq(*lookup.correlation_id.as_uuid()))
                        .filter(photos::is_edited.eq(true))
                        .select(PhotoRow::as_select())
                        .for_update()
                        .first(conn)
                        .await
                        .optional()
                        .map_err(map_diesel_error)?;
                    let Some(row) = locked else {
                        return Ok(Finalize::Missing);
                    };
                    let placeholder = row_to_photo(row)?;
                    if !lookup.matches(&placeholder) {
                        return Ok(Finalize::Missing);
                    }
                    let Some(completed) = placeholder.complete_edit(&completion) else {
                        return Ok(Finalize::NotPending);
                    };

                    let update = EditCompletionUpdate {
                        storage_key: completed.storage_key().as_str(),
                        filename: completed.filename(),
                        size_bytes: size_to_db(completed.size_bytes())?,
                        edit_status: completed.edit_status().map(EditStatus::as_str),
                        edit_error: completed.edit_error(),
                    };
                    let row = diesel::update(
                        photos::table
                            .find(*completed.id().as_uuid())
                            .filter(photos::edit_status.eq(EditStatus::Pending.as_str())),
                    )
                    .set(&update)
                    .returning(PhotoRow::as_returning())
                    .get_result(conn)
                    .await
                    .optional()
                    .map_err(map_diesel_error)?;
                    Ok(row.map_or(Finalize::NotPending, Finalize::Applied))
                }
                .scope_boxed()
            })
            .await?;

        match outcome {
            Finalize::Missing | Finalize::NotPending => Ok(None),
            Finalize::Applied(row) => row_to_photo(row).map(Some),
        }
    }

    async fn soft_delete(&self, id: PhotoId, at: DateTime<Utc>) -> Result<bool, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = diesel::update(
            photos::table
                .find(*id.as_uuid())
                .filter(photos::deleted_at.is_null()),
        )
        .set(photos::deleted_at.eq(at))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(updated > 0)
    }

    async fn delete(&self, id: PhotoId) -> Result<bool, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let deleted = diesel::delete(photos::table.find(*id.as_uuid()))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(deleted > 0)
    }

    async fn usage(&self) -> Result<PhotoUsage, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let (count, bytes): (i64, i64) = photos::table
            .select((
                count_star(),
                sql::<BigInt>("COALESCE(SUM(size_bytes), 0)::bigint"),
            ))
            .first(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let corrupt = |err: std::num::TryFromIntError| corrupt_row("photos", err);
        Ok(PhotoUsage {
            photos: u64::try_from(count).map_err(corrupt)?,
            stored_bytes: u64::try_from(bytes).map_err(corrupt)?,
        })
    }

    async fn expire_pending_edits(
        &self,
        created_before: DateTime<Utc>,
        error: &str,
    ) -> Result<u64, LedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let expired = diesel::update(
            photos::table
                .filter(photos::edit_status.eq(EditStatus::Pending.as_str()))
                .filter(photos::created_at.lt(created_before)),
        )
        .set((
            photos::edit_status.eq(EditStatus::Failed.as_str()),
            photos::edit_error.eq(error),
        ))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(u64::try_from(expired).unwrap_or(u64::MAX))
    }
}
