//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `migrations/` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Sharing groups. `member_ids` always contains `creator_id`.
    groups (id) {
        id -> Uuid,
        name -> Varchar,
        share_code -> Text,
        creator_id -> Uuid,
        member_ids -> Array<Uuid>,
        is_active -> Bool,
        created_at -> Timestamptz,
        expiry_date -> Timestamptz,
        deletion_date -> Timestamptz,
    }
}

diesel::table! {
    /// Uploaded photos and edit placeholders.
    ///
    /// Edit columns are null on plain uploads. `storage_key` holds a
    /// `pending-edit/` sentinel until an edit finalizes successfully.
    photos (id) {
        id -> Uuid,
        group_id -> Uuid,
        storage_key -> Text,
        filename -> Text,
        original_name -> Text,
        mime_type -> Varchar,
        size_bytes -> Int8,
        uploader_id -> Uuid,
        is_edited -> Bool,
        original_photo_id -> Nullable<Uuid>,
        correlation_id -> Nullable<Uuid>,
        edit_status -> Nullable<Varchar>,
        edit_error -> Nullable<Text>,
        created_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::joinable!(photos -> groups (group_id));
diesel::allow_tables_to_appear_in_same_query!(groups, photos);
