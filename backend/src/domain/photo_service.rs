//! Photo use cases: upload, read with signed URLs, list, and delete.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::access_policy::{self, GroupAction};
use super::ports::{GroupLedger, ObjectStore, PhotoLedger};
use super::{DomainError, DomainResult, Group, GroupId, Photo, PhotoId, UserId};

/// MIME types accepted for upload.
pub const ALLOWED_MIME_TYPES: [&str; 6] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/heic",
    "image/heif",
];

/// File extensions accepted for upload, lowercase and without the dot.
pub const ALLOWED_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "webp", "heic", "heif"];

/// One file in an upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    fn is_allowed_image(&self) -> bool {
        let content_type = self.content_type.trim().to_ascii_lowercase();
        let extension = self
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());
        ALLOWED_MIME_TYPES.contains(&content_type.as_str())
            && extension.is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
    }
}

/// Photo record paired with a time-limited read URL.
///
/// `url` is `None` while the photo is an unfinished or failed edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoView {
    pub photo: Photo,
    pub url: Option<String>,
}

/// Photo use cases over the ledgers and the object store.
#[derive(Clone)]
pub struct PhotoService {
    groups: Arc<dyn GroupLedger>,
    photos: Arc<dyn PhotoLedger>,
    objects: Arc<dyn ObjectStore>,
    signed_url_ttl: Duration,
}

impl PhotoService {
    pub fn new(
        groups: Arc<dyn GroupLedger>,
        photos: Arc<dyn PhotoLedger>,
        objects: Arc<dyn ObjectStore>,
        signed_url_ttl: Duration,
    ) -> Self {
        Self {
            groups,
            photos,
            objects,
            signed_url_ttl,
        }
    }

    async fn load_group(&self, id: GroupId) -> DomainResult<Group> {
        self.groups
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("group {id} not found")))
    }

    async fn view(&self, photo: Photo) -> DomainResult<PhotoView> {
        let url = if photo.is_displayable() {
            Some(
                self.objects
                    .signed_url(photo.storage_key(), self.signed_url_ttl)
                    .await?,
            )
        } else {
            None
        };
        Ok(PhotoView { photo, url })
    }

    /// Store a batch of images in `group_id`.
    ///
    /// The batch is all-or-nothing at validation time: one unsupported file
    /// rejects every file, and the error details list the offenders.
    pub async fn upload_photos(
        &self,
        group_id: GroupId,
        files: Vec<UploadFile>,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Photo>> {
        let group = self.load_group(group_id).await?;
        if let Some(denial) = access_policy::mutate_denial(&group, user, GroupAction::Upload, now)
        {
            return Err(DomainError::forbidden(denial.message()));
        }
        if files.is_empty() {
            return Err(DomainError::invalid_request("no files were uploaded"));
        }
        let rejected: Vec<&str> = files
            .iter()
            .filter(|file| !file.is_allowed_image())
            .map(|file| file.filename.as_str())
            .collect();
        if !rejected.is_empty() {
            return Err(
                DomainError::invalid_request("only image files are accepted")
                    .with_details(json!({ "rejectedFiles": rejected })),
            );
        }

        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            let UploadFile {
                filename,
                content_type,
                bytes,
            } = file;
            let size_bytes = bytes.len() as u64;
            let key = self.objects.put(bytes, &content_type, group_id).await?;
            let photo = Photo::uploaded(
                group_id,
                key,
                &filename,
                &content_type,
                size_bytes,
                user.clone(),
                now,
            );
            if let Err(err) = self.photos.insert(&photo).await {
                if let Err(cleanup) = self.objects.delete(photo.storage_key()).await {
                    warn!(
                        key = %photo.storage_key(),
                        error = %cleanup,
                        "orphaned object left behind"
                    );
                }
                return Err(err.into());
            }
            stored.push(photo);
        }
        info!(group_id = %group_id, count = stored.len(), "photos uploaded");
        Ok(stored)
    }

    pub async fn get_photo(
        &self,
        id: PhotoId,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<PhotoView> {
        let photo = self
            .photos
            .find_live(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("photo {id} not found")))?;
        let group = self.load_group(photo.group_id()).await?;
        if let Some(denial) = access_policy::read_denial(&group, user, now) {
            return Err(DomainError::forbidden(denial.message()));
        }
        self.view(photo).await
    }

    /// Displayable photos of a group, each with a signed URL.
    pub async fn list_group_photos(
        &self,
        group_id: GroupId,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<PhotoView>> {
        let group = self.load_group(group_id).await?;
        if let Some(denial) = access_policy::read_denial(&group, user, now) {
            return Err(DomainError::forbidden(denial.message()));
        }
        let photos = self.photos.list_live_for_group(group_id).await?;
        let mut views = Vec::with_capacity(photos.len());
        for photo in photos.into_iter().filter(Photo::is_displayable) {
            views.push(self.view(photo).await?);
        }
        Ok(views)
    }

    /// Remove a photo's bytes and record. Only its uploader or the group
    /// creator may do this; a missing photo succeeds silently.
    pub async fn delete_photo(&self, id: PhotoId, user: &UserId) -> DomainResult<()> {
        let Some(photo) = self.photos.find_any(id).await? else {
            debug!(photo_id = %id, "delete of missing photo ignored");
            return Ok(());
        };
        let group = self.load_group(photo.group_id()).await?;
        if photo.uploader_id() != user && !group.is_creator(user) {
            return Err(DomainError::forbidden(
                "only the uploader or the group creator may delete this photo",
            ));
        }

        if !photo.storage_key().is_pending_sentinel() {
            self.objects.delete(photo.storage_key()).await?;
        }
        self.photos.delete(id).await?;
        info!(photo_id = %id, group_id = %photo.group_id(), "photo deleted");
        Ok(())
    }
}

#[cfg(test)]
#[path = "photo_service_tests.rs"]
mod tests;
