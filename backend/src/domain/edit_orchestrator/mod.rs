//! Asynchronous photo edit protocol.
//!
//! An accepted edit is durable from the moment [`EditOrchestrator::submit`]
//! returns: a placeholder photo row marks the request as pending, keyed by a
//! fresh [`CorrelationId`]. Responses arrive later, possibly duplicated or
//! never, and are applied by [`EditOrchestrator::on_response`] exactly once
//! per correlation id through the ledger's conditional finalize.
//!
//! A success response whose image can no longer be attached to any photo
//! has its uploaded object removed from the store.
//!
//! Correlation state lives only in the ledger, so any replica can apply any
//! response and restarts lose nothing. In-process waiters are woken through a
//! broadcast channel and fall back to polling the ledger for responses
//! applied elsewhere.
//!
//! ```text
//! submit ──► placeholder(pending) ──► publish request
//!                                         │
//! worker ──► response ──► consumer task ──► on_response
//!                                         │
//!                 pending ──► succeeded (original soft-deleted)
//!                         └─► failed
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mockable::Clock;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::access_policy;
use super::edit_message::UNSPECIFIED_EDIT_ERROR;
use super::ports::{
    Disposition, EditLookup, EditRequestPublisher, GroupLedger, LedgerError, ObjectStore,
    PhotoLedger,
};
use super::{
    CorrelationId, DomainError, DomainResult, EditCompletion, EditRequestMessage, EditResponse,
    EditStatus, Photo, PhotoId, StorageKey, UserId,
};

mod consumer;

pub use consumer::{ConsumerReport, EditResponseConsumer};

/// Error recorded on a placeholder whose request never reached the broker.
pub const PUBLISH_FAILED_ERROR: &str = "edit request could not be published";

/// Tuning for [`EditOrchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditOrchestratorConfig {
    /// How often a waiting caller re-reads the ledger.
    pub wait_poll_interval: Duration,
    /// Capacity of the completion broadcast; slow waiters fall back to polling.
    pub notice_capacity: usize,
}

impl Default for EditOrchestratorConfig {
    fn default() -> Self {
        Self {
            wait_poll_interval: Duration::from_secs(1),
            notice_capacity: 256,
        }
    }
}

/// Broadcast whenever this process moves a placeholder to a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditNotice {
    pub correlation_id: CorrelationId,
    pub photo: Photo,
}

/// Result of [`EditOrchestrator::submit_and_wait`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// The edited photo, finalized and displayable.
    Succeeded(Photo),
    /// The worker reported failure; the original is untouched.
    Failed { placeholder: Photo, error: String },
    /// No response within the wait. The request stays pending and a late
    /// response is still applied.
    TimedOut { placeholder: Photo },
}

impl EditOutcome {
    fn from_terminal(photo: Photo) -> Option<Self> {
        match photo.edit_status()? {
            EditStatus::Pending => None,
            EditStatus::Succeeded => Some(Self::Succeeded(photo)),
            EditStatus::Failed => {
                let error = photo
                    .edit_error()
                    .unwrap_or(UNSPECIFIED_EDIT_ERROR)
                    .to_owned();
                Some(Self::Failed {
                    placeholder: photo,
                    error,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseEffect {
    Finalized(EditStatus),
    Duplicate,
    Unmatched,
}

/// Drives edit requests from acceptance to a terminal state.
pub struct EditOrchestrator {
    groups: Arc<dyn GroupLedger>,
    photos: Arc<dyn PhotoLedger>,
    publisher: Arc<dyn EditRequestPublisher>,
    objects: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    notices: broadcast::Sender<EditNotice>,
    config: EditOrchestratorConfig,
}

impl EditOrchestrator {
    pub fn new(
        groups: Arc<dyn GroupLedger>,
        photos: Arc<dyn PhotoLedger>,
        publisher: Arc<dyn EditRequestPublisher>,
        objects: Arc<dyn ObjectStore>,
        clock: Arc<dyn Clock>,
        config: EditOrchestratorConfig,
    ) -> Self {
        let (notices, _) = broadcast::channel(config.notice_capacity.max(1));
        Self {
            groups,
            photos,
            publisher,
            objects,
            clock,
            notices,
            config,
        }
    }

    /// Completion notices for edits finalized by this process.
    pub fn subscribe(&self) -> broadcast::Receiver<EditNotice> {
        self.notices.subscribe()
    }

    /// Accept an edit of `photo_id` and publish it to the worker.
    ///
    /// Returns the pending placeholder immediately. Access is checked before
    /// anything is written, so a refused request leaves no trace.
    ///
    /// # Errors
    /// - `InvalidRequest` for a blank prompt.
    /// - `NotFound` when the photo or its group is gone.
    /// - `Forbidden` unless the group is active and `user` is a member.
    /// - `ServiceUnavailable` when the request cannot be published; the
    ///   placeholder is then marked failed.
    pub async fn submit(
        &self,
        photo_id: PhotoId,
        prompt: &str,
        user: &UserId,
    ) -> DomainResult<Photo> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(DomainError::invalid_request("edit prompt must not be empty"));
        }
        let now = self.clock.utc();

        let original = self
            .photos
            .find_live(photo_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("photo {photo_id} not found")))?;
        let group = self
            .groups
            .find_by_id(original.group_id())
            .await?
            .ok_or_else(|| DomainError::not_found("group not found"))?;
        if let Some(denial) = access_policy::edit_denial(&group, &original, user, now) {
            debug!(photo_id = %photo_id, user_id = %user, ?denial, "edit refused");
            return Err(DomainError::forbidden(denial.message()));
        }

        let correlation_id = CorrelationId::generate();
        let placeholder = Photo::edit_placeholder(&original, user.clone(), correlation_id, now);
        self.photos.insert(&placeholder).await?;

        let message = EditRequestMessage::for_placeholder(
            &original,
            &placeholder,
            prompt,
            user,
            correlation_id,
        );
        if let Err(err) = self.publisher.publish(&message).await {
            warn!(%correlation_id, error = %err, "edit request publish failed");
            self.abandon(&placeholder, correlation_id).await;
            return Err(err.into());
        }

        info!(
            %correlation_id,
            photo_id = %photo_id,
            edit_photo_id = %placeholder.id(),
            "edit request published"
        );
        Ok(placeholder)
    }

    async fn abandon(&self, placeholder: &Photo, correlation_id: CorrelationId) {
        let lookup = EditLookup {
            correlation_id,
            original_photo_id: placeholder.original_photo_id(),
        };
        let completion = EditCompletion::Failed {
            error: PUBLISH_FAILED_ERROR.to_owned(),
        };
        match self.photos.complete_pending_edit(&lookup, &completion).await {
            Ok(Some(failed)) => self.notify(correlation_id, failed),
            Ok(None) => {}
            Err(err) => {
                warn!(%correlation_id, error = %err, "placeholder left pending until expiry");
            }
        }
    }

    /// [`Self::submit`], then wait up to `timeout` for a terminal state.
    ///
    /// Timing out abandons only the wait; the request stays live.
    pub async fn submit_and_wait(
        &self,
        photo_id: PhotoId,
        prompt: &str,
        user: &UserId,
        timeout: Duration,
    ) -> DomainResult<EditOutcome> {
        let mut notices = self.notices.subscribe();
        let placeholder = self.submit(photo_id, prompt, user).await?;
        let Some(correlation_id) = placeholder.correlation_id() else {
            return Err(DomainError::internal("placeholder lacks a correlation id"));
        };
        let lookup = EditLookup {
            correlation_id,
            original_photo_id: placeholder.original_photo_id(),
        };

        let deadline = tokio::time::sleep_until(Instant::now() + timeout);
        tokio::pin!(deadline);
        let mut poll = tokio::time::interval(self.config.wait_poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut listening = true;

        loop {
            tokio::select! {
                () = &mut deadline => {
                    debug!(%correlation_id, "edit wait timed out");
                    return Ok(EditOutcome::TimedOut { placeholder });
                }
                notice = notices.recv(), if listening => match notice {
                    Ok(notice) if notice.correlation_id == correlation_id => {
                        if let Some(outcome) = EditOutcome::from_terminal(notice.photo) {
                            return Ok(outcome);
                        }
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => listening = false,
                },
                _ = poll.tick() => match self.photos.find_edit(&lookup).await {
                    Ok(Some(photo)) => {
                        if let Some(outcome) = EditOutcome::from_terminal(photo) {
                            return Ok(outcome);
                        }
                    }
                    Ok(None) => {
                        return Err(DomainError::not_found("edited photo was removed"));
                    }
                    Err(err) => warn!(%correlation_id, error = %err, "edit status poll failed"),
                },
            }
        }
    }

    /// Apply one raw response payload and say how to settle its delivery.
    ///
    /// - Unparseable payloads are dropped; redelivery cannot fix them.
    /// - Ledger failures requeue, so the transition is retried later.
    /// - Everything else is acknowledged, including duplicates and responses
    ///   that match no placeholder.
    pub async fn on_response(&self, payload: &[u8]) -> Disposition {
        let response = match EditResponse::parse(payload) {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "dropping unparseable edit response");
                return Disposition::Drop;
            }
        };
        let correlation_id = response.correlation_id;

        match self.apply(&response).await {
            Ok(ResponseEffect::Finalized(status)) => {
                info!(%correlation_id, status = status.as_str(), "edit finalized");
                Disposition::Ack
            }
            Ok(ResponseEffect::Duplicate) => {
                debug!(%correlation_id, "edit already terminal; response ignored");
                Disposition::Ack
            }
            Ok(ResponseEffect::Unmatched) => {
                warn!(%correlation_id, "edit response matches no placeholder");
                Disposition::Ack
            }
            Err(err) => {
                warn!(%correlation_id, error = %err, "edit response deferred for redelivery");
                Disposition::Requeue
            }
        }
    }

    async fn apply(&self, response: &EditResponse) -> Result<ResponseEffect, LedgerError> {
        let lookup = EditLookup {
            correlation_id: response.correlation_id,
            original_photo_id: response.original_photo_id,
        };
        let now = self.clock.utc();

        if let Some(finalized) = self
            .photos
            .complete_pending_edit(&lookup, &response.completion)
            .await?
        {
            let status = finalized.edit_status().unwrap_or(EditStatus::Failed);
            if status == EditStatus::Succeeded {
                self.retire_original(&finalized, now).await?;
            }
            self.notify(response.correlation_id, finalized);
            return Ok(ResponseEffect::Finalized(status));
        }

        let existing = self.photos.find_edit(&lookup).await?;
        if let EditCompletion::Succeeded { storage_key, .. } = &response.completion {
            let attached = existing
                .as_ref()
                .is_some_and(|photo| photo.storage_key() == storage_key);
            if !attached {
                self.discard_unapplied(response.correlation_id, storage_key).await;
            }
        }
        match existing {
            Some(existing) => {
                if existing.edit_status() == Some(EditStatus::Succeeded) {
                    // Completes a finalize whose original soft-delete was interrupted.
                    self.retire_original(&existing, now).await?;
                }
                Ok(ResponseEffect::Duplicate)
            }
            None => Ok(ResponseEffect::Unmatched),
        }
    }

    async fn discard_unapplied(&self, correlation_id: CorrelationId, key: &StorageKey) {
        match self.objects.delete(key).await {
            Ok(()) => info!(%correlation_id, storage_key = %key, "unapplied edit image removed"),
            Err(err) => warn!(
                %correlation_id,
                storage_key = %key,
                error = %err,
                "unapplied edit image left in store"
            ),
        }
    }

    async fn retire_original(&self, edited: &Photo, now: DateTime<Utc>) -> Result<(), LedgerError> {
        let Some(original_id) = edited.original_photo_id() else {
            return Ok(());
        };
        if self.photos.soft_delete(original_id, now).await? {
            info!(
                photo_id = %original_id,
                edit_photo_id = %edited.id(),
                "original photo retired"
            );
        }
        Ok(())
    }

    fn notify(&self, correlation_id: CorrelationId, photo: Photo) {
        if self
            .notices
            .send(EditNotice {
                correlation_id,
                photo,
            })
            .is_err()
        {
            debug!(%correlation_id, "no local waiters for edit notice");
        }
    }
}
