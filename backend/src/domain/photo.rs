//! Photo records and the edit-placeholder state they carry.
//!
//! A photo is either an upload or an edited variant of another photo. Edited
//! variants start life as a placeholder whose storage key is a sentinel
//! derived from the edit's correlation id; the placeholder row is the durable
//! marker that an edit is in flight.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CorrelationId, GroupId, UserId};

const PENDING_EDIT_PREFIX: &str = "pending-edit/";

/// Validation errors raised while building a [`Photo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoValidationError {
    EmptyStorageKey,
    EditedWithoutOriginal,
    OriginalWithoutEdit,
    EditStateWithoutEdit,
    CorrelationWithoutEditState,
    UnknownEditStatus(String),
}

impl fmt::Display for PhotoValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyStorageKey => write!(f, "storage key must not be empty"),
            Self::EditedWithoutOriginal => {
                write!(f, "edited photos must reference their original")
            }
            Self::OriginalWithoutEdit => {
                write!(f, "only edited photos may reference an original")
            }
            Self::EditStateWithoutEdit => {
                write!(f, "edit status is only valid on edited photos")
            }
            Self::CorrelationWithoutEditState => {
                write!(f, "correlation id and edit status must be set together")
            }
            Self::UnknownEditStatus(value) => write!(f, "unknown edit status: {value}"),
        }
    }
}

impl std::error::Error for PhotoValidationError {}

/// Opaque photo identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoId(Uuid);

impl PhotoId {
    /// Generate a new random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Object-store key for a photo's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageKey(String);

impl StorageKey {
    /// Validate a non-empty key.
    pub fn new(key: impl Into<String>) -> Result<Self, PhotoValidationError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(PhotoValidationError::EmptyStorageKey);
        }
        Ok(Self(key))
    }

    /// Sentinel key held by an edit placeholder until its response lands.
    ///
    /// # Examples
    /// ```
    /// use photoshare::domain::{CorrelationId, StorageKey};
    ///
    /// let key = StorageKey::pending_edit(&CorrelationId::generate());
    /// assert!(key.is_pending_sentinel());
    /// ```
    pub fn pending_edit(correlation_id: &CorrelationId) -> Self {
        Self(format!("{PENDING_EDIT_PREFIX}{correlation_id}"))
    }

    /// True when no object exists behind this key.
    pub fn is_pending_sentinel(&self) -> bool {
        self.0.starts_with(PENDING_EDIT_PREFIX)
    }

    /// Last non-empty path segment, used as the stored filename.
    pub fn file_name(&self) -> Option<&str> {
        self.0.rsplit('/').next().filter(|segment| !segment.is_empty())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<StorageKey> for String {
    fn from(value: StorageKey) -> Self {
        value.0
    }
}

impl TryFrom<String> for StorageKey {
    type Error = PhotoValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Terminal-or-pending state of an edited photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditStatus {
    /// Request published, no response applied yet.
    Pending,
    /// Worker produced an image; the record points at it.
    Succeeded,
    /// Worker reported failure, or the request expired unanswered.
    Failed,
}

impl EditStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl FromStr for EditStatus {
    type Err = PhotoValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(PhotoValidationError::UnknownEditStatus(other.to_owned())),
        }
    }
}

/// Result carried by an edit response, applied to a pending placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditCompletion {
    Succeeded {
        storage_key: StorageKey,
        size_bytes: u64,
    },
    Failed {
        error: String,
    },
}

/// Unvalidated photo fields, used when rehydrating from storage.
#[derive(Debug, Clone)]
pub struct PhotoDraft {
    pub id: PhotoId,
    pub group_id: GroupId,
    pub storage_key: StorageKey,
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub uploader_id: UserId,
    pub is_edited: bool,
    pub original_photo_id: Option<PhotoId>,
    pub correlation_id: Option<CorrelationId>,
    pub edit_status: Option<EditStatus>,
    pub edit_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Photo belonging to exactly one group.
///
/// ## Invariants
/// - `is_edited` holds exactly when `original_photo_id` is set. The link is a
///   lookup relation only; neither side owns the other.
/// - `edit_status` and `correlation_id` are set together, and only on edited
///   photos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    id: PhotoId,
    group_id: GroupId,
    storage_key: StorageKey,
    filename: String,
    original_name: String,
    mime_type: String,
    size_bytes: u64,
    uploader_id: UserId,
    is_edited: bool,
    original_photo_id: Option<PhotoId>,
    correlation_id: Option<CorrelationId>,
    edit_status: Option<EditStatus>,
    edit_error: Option<String>,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl Photo {
    /// Validate a draft and build the record.
    pub fn new(draft: PhotoDraft) -> Result<Self, PhotoValidationError> {
        match (draft.is_edited, draft.original_photo_id.is_some()) {
            (true, false) => return Err(PhotoValidationError::EditedWithoutOriginal),
            (false, true) => return Err(PhotoValidationError::OriginalWithoutEdit),
            _ => {}
        }
        if draft.edit_status.is_some() && !draft.is_edited {
            return Err(PhotoValidationError::EditStateWithoutEdit);
        }
        if draft.edit_status.is_some() != draft.correlation_id.is_some() {
            return Err(PhotoValidationError::CorrelationWithoutEditState);
        }

        let PhotoDraft {
            id,
            group_id,
            storage_key,
            filename,
            original_name,
            mime_type,
            size_bytes,
            uploader_id,
            is_edited,
            original_photo_id,
            correlation_id,
            edit_status,
            edit_error,
            created_at,
            deleted_at,
        } = draft;

        Ok(Self {
            id,
            group_id,
            storage_key,
            filename,
            original_name,
            mime_type,
            size_bytes,
            uploader_id,
            is_edited,
            original_photo_id,
            correlation_id,
            edit_status,
            edit_error,
            created_at,
            deleted_at,
        })
    }

    /// Record a freshly uploaded file.
    pub fn uploaded(
        group_id: GroupId,
        storage_key: StorageKey,
        original_name: &str,
        mime_type: &str,
        size_bytes: u64,
        uploader_id: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        let filename = storage_key
            .file_name()
            .unwrap_or(original_name)
            .to_owned();
        Self {
            id: PhotoId::random(),
            group_id,
            storage_key,
            filename,
            original_name: original_name.to_owned(),
            mime_type: mime_type.to_owned(),
            size_bytes,
            uploader_id,
            is_edited: false,
            original_photo_id: None,
            correlation_id: None,
            edit_status: None,
            edit_error: None,
            created_at: now,
            deleted_at: None,
        }
    }

    /// Build the pending placeholder for an edit of `original`.
    pub fn edit_placeholder(
        original: &Photo,
        requester: UserId,
        correlation_id: CorrelationId,
        now: DateTime<Utc>,
    ) -> Self {
        let storage_key = StorageKey::pending_edit(&correlation_id);
        Self {
            id: PhotoId::random(),
            group_id: original.group_id,
            filename: storage_key.as_str().to_owned(),
            storage_key,
            original_name: format!("edited_{}", original.original_name),
            mime_type: original.mime_type.clone(),
            size_bytes: 0,
            uploader_id: requester,
            is_edited: true,
            original_photo_id: Some(original.id),
            correlation_id: Some(correlation_id),
            edit_status: Some(EditStatus::Pending),
            edit_error: None,
            created_at: now,
            deleted_at: None,
        }
    }

    /// Apply an edit response to a pending placeholder.
    ///
    /// Returns `None` when the photo is not a pending placeholder, so the
    /// caller can treat the response as already applied.
    pub fn complete_edit(&self, completion: &EditCompletion) -> Option<Self> {
        let status = self.edit_status?;
        if status.is_terminal() {
            return None;
        }
        let mut next = self.clone();
        match completion {
            EditCompletion::Succeeded {
                storage_key,
                size_bytes,
            } => {
                if let Some(name) = storage_key.file_name() {
                    next.filename = name.to_owned();
                }
                next.storage_key = storage_key.clone();
                next.size_bytes = *size_bytes;
                next.edit_status = Some(EditStatus::Succeeded);
            }
            EditCompletion::Failed { error } => {
                next.edit_status = Some(EditStatus::Failed);
                next.edit_error = Some(error.clone());
            }
        }
        Some(next)
    }

    /// Return the record with its soft-delete marker set, keeping an existing one.
    pub fn soft_deleted(mut self, at: DateTime<Utc>) -> Self {
        self.deleted_at.get_or_insert(at);
        self
    }

    pub fn id(&self) -> PhotoId {
        self.id
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn storage_key(&self) -> &StorageKey {
        &self.storage_key
    }

    pub fn filename(&self) -> &str {
        self.filename.as_str()
    }

    pub fn original_name(&self) -> &str {
        self.original_name.as_str()
    }

    pub fn mime_type(&self) -> &str {
        self.mime_type.as_str()
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn uploader_id(&self) -> &UserId {
        &self.uploader_id
    }

    pub fn is_edited(&self) -> bool {
        self.is_edited
    }

    pub fn original_photo_id(&self) -> Option<PhotoId> {
        self.original_photo_id
    }

    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.correlation_id
    }

    pub fn edit_status(&self) -> Option<EditStatus> {
        self.edit_status
    }

    pub fn edit_error(&self) -> Option<&str> {
        self.edit_error.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn is_soft_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// True when the record points at real image bytes and is not hidden.
    pub fn is_displayable(&self) -> bool {
        !self.is_soft_deleted()
            && matches!(self.edit_status, None | Some(EditStatus::Succeeded))
    }
}
