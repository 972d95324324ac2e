//! Internal Diesel row structs.
//!
//! Rows never leave the persistence layer; adapters convert them to domain
//! aggregates, which re-run their own validation.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{groups, photos};

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = groups)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct GroupRow {
    pub id: Uuid,
    pub name: String,
    pub share_code: String,
    pub creator_id: Uuid,
    pub member_ids: Vec<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub deletion_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = photos)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PhotoRow {
    pub id: Uuid,
    pub group_id: Uuid,
    pub storage_key: String,
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub uploader_id: Uuid,
    pub is_edited: bool,
    pub original_photo_id: Option<Uuid>,
    pub correlation_id: Option<Uuid>,
    pub edit_status: Option<String>,
    pub edit_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Columns rewritten when an edit placeholder reaches a terminal state.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = photos)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct EditCompletionUpdate<'a> {
    pub storage_key: &'a str,
    pub filename: &'a str,
    pub size_bytes: i64,
    pub edit_status: Option<&'a str>,
    pub edit_error: Option<&'a str>,
}
