//! Time-windowed access rules for groups and their photos.
//!
//! Every read and write path asks this module, never the raw timestamps. All
//! functions are pure in `(group, user, now)`.
//!
//! | phase   | window                              | read           | upload/join/edit |
//! |---------|-------------------------------------|----------------|------------------|
//! | active  | `now <= expiry_date`                | members        | members          |
//! | grace   | `expiry_date < now <= deletion_date`| creator only   | nobody           |
//! | expired | `now > deletion_date`               | nobody         | nobody           |
//!
//! A group whose `is_active` flag was cleared by its creator is closed to
//! everyone regardless of phase.

use chrono::{DateTime, Utc};

use super::{Group, Photo, UserId};

/// Lifecycle phase derived from a group's timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    Active,
    Grace,
    Expired,
}

/// Mutating actions gated by [`can_mutate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupAction {
    Upload,
    Join,
    Delete,
}

/// Why an access check failed, for error messages and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenial {
    GroupDeleted,
    GroupExpired,
    GracePeriod,
    NotMember,
    NotCreator,
    PhotoNotInGroup,
    PhotoNotDisplayable,
}

impl AccessDenial {
    pub fn message(self) -> &'static str {
        match self {
            Self::GroupDeleted => "group has been deleted",
            Self::GroupExpired => "group has expired",
            Self::GracePeriod => "group is read-only during its grace period",
            Self::NotMember => "user is not a member of this group",
            Self::NotCreator => "only the group creator may do this",
            Self::PhotoNotInGroup => "photo does not belong to this group",
            Self::PhotoNotDisplayable => "photo is not available for editing",
        }
    }
}

/// Phase for the given timestamps at `now`.
///
/// # Examples
/// ```
/// use chrono::{TimeDelta, Utc};
/// use photoshare::domain::access_policy::{LifecyclePhase, lifecycle_phase};
///
/// let now = Utc::now();
/// let expiry = now;
/// let deletion = now + TimeDelta::days(30);
/// assert_eq!(lifecycle_phase(expiry, deletion, now), LifecyclePhase::Active);
/// assert_eq!(
///     lifecycle_phase(expiry, deletion, now + TimeDelta::seconds(1)),
///     LifecyclePhase::Grace
/// );
/// ```
pub fn lifecycle_phase(
    expiry_date: DateTime<Utc>,
    deletion_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> LifecyclePhase {
    if now <= expiry_date {
        LifecyclePhase::Active
    } else if now <= deletion_date {
        LifecyclePhase::Grace
    } else {
        LifecyclePhase::Expired
    }
}

/// Phase of `group` at `now`.
pub fn group_phase(group: &Group, now: DateTime<Utc>) -> LifecyclePhase {
    lifecycle_phase(group.expiry_date(), group.deletion_date(), now)
}

/// Explain why `user_id` may not read `group`, if it may not.
pub fn read_denial(group: &Group, user_id: &UserId, now: DateTime<Utc>) -> Option<AccessDenial> {
    if !group.is_active() {
        return Some(AccessDenial::GroupDeleted);
    }
    match group_phase(group, now) {
        LifecyclePhase::Active if group.is_member(user_id) => None,
        LifecyclePhase::Active => Some(AccessDenial::NotMember),
        LifecyclePhase::Grace if group.is_creator(user_id) => None,
        LifecyclePhase::Grace => Some(AccessDenial::NotCreator),
        LifecyclePhase::Expired => Some(AccessDenial::GroupExpired),
    }
}

pub fn can_read(group: &Group, user_id: &UserId, now: DateTime<Utc>) -> bool {
    read_denial(group, user_id, now).is_none()
}

/// Explain why `user_id` may not perform `action` on `group`, if it may not.
///
/// Joining is checked before membership exists, so it only needs an open,
/// active group. Deleting is creator-only in every phase, but a group that is
/// already deleted refuses further actions.
pub fn mutate_denial(
    group: &Group,
    user_id: &UserId,
    action: GroupAction,
    now: DateTime<Utc>,
) -> Option<AccessDenial> {
    if !group.is_active() {
        return Some(AccessDenial::GroupDeleted);
    }
    if action == GroupAction::Delete {
        return (!group.is_creator(user_id)).then_some(AccessDenial::NotCreator);
    }
    match group_phase(group, now) {
        LifecyclePhase::Active => {}
        LifecyclePhase::Grace => return Some(AccessDenial::GracePeriod),
        LifecyclePhase::Expired => return Some(AccessDenial::GroupExpired),
    }
    match action {
        GroupAction::Join => None,
        _ if group.is_member(user_id) => None,
        _ => Some(AccessDenial::NotMember),
    }
}

pub fn can_mutate(
    group: &Group,
    user_id: &UserId,
    action: GroupAction,
    now: DateTime<Utc>,
) -> bool {
    mutate_denial(group, user_id, action, now).is_none()
}

/// Explain why `user_id` may not request an edit of `photo`, if it may not.
///
/// Edits need the same rights as uploading, and the photo must be a live,
/// finished image in that group.
pub fn edit_denial(
    group: &Group,
    photo: &Photo,
    user_id: &UserId,
    now: DateTime<Utc>,
) -> Option<AccessDenial> {
    if let Some(denial) = mutate_denial(group, user_id, GroupAction::Upload, now) {
        return Some(denial);
    }
    if photo.group_id() != group.id() {
        return Some(AccessDenial::PhotoNotInGroup);
    }
    (!photo.is_displayable()).then_some(AccessDenial::PhotoNotDisplayable)
}

pub fn can_request_edit(
    group: &Group,
    photo: &Photo,
    user_id: &UserId,
    now: DateTime<Utc>,
) -> bool {
    edit_denial(group, photo, user_id, now).is_none()
}
