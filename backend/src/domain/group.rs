//! Sharing group aggregate.
//!
//! A group is a time-boxed sharing scope. Its lifecycle is implicit in the
//! stored timestamps; see [`crate::domain::access_policy`] for how those
//! timestamps translate into read and write rights.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

/// Days a group accepts uploads, joins, and edits after creation.
pub const ACTIVE_WINDOW_DAYS: i64 = 30;
/// Days after expiry during which only the creator can still read the group.
pub const GRACE_WINDOW_DAYS: i64 = 30;
/// Maximum group name length in characters.
pub const GROUP_NAME_MAX: usize = 100;
/// Length of freshly generated share codes.
pub const SHARE_CODE_LEN: usize = 10;

/// Validation errors raised while building a [`Group`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupValidationError {
    EmptyName,
    NameTooLong { max: usize },
    EmptyShareCode,
    InvalidShareCode,
    CreatorNotMember,
    TimestampsOutOfOrder,
}

impl fmt::Display for GroupValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "group name must not be empty"),
            Self::NameTooLong { max } => {
                write!(f, "group name must be at most {max} characters")
            }
            Self::EmptyShareCode => write!(f, "share code must not be empty"),
            Self::InvalidShareCode => {
                write!(f, "share code must not contain whitespace")
            }
            Self::CreatorNotMember => write!(f, "group creator must be a member"),
            Self::TimestampsOutOfOrder => write!(
                f,
                "group timestamps must satisfy created_at < expiry_date < deletion_date",
            ),
        }
    }
}

impl std::error::Error for GroupValidationError {}

/// Opaque group identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(Uuid);

impl GroupId {
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

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Secret token that lets a user join a group. Unique across all groups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShareCode(String);

impl ShareCode {
    /// Validate a caller-supplied share code.
    pub fn new(code: impl Into<String>) -> Result<Self, GroupValidationError> {
        let code = code.into();
        if code.is_empty() {
            return Err(GroupValidationError::EmptyShareCode);
        }
        if code.chars().any(char::is_whitespace) {
            return Err(GroupValidationError::InvalidShareCode);
        }
        Ok(Self(code))
    }

    /// Generate a random alphanumeric share code.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = rng
            .sample_iter(&Alphanumeric)
            .take(SHARE_CODE_LEN)
            .map(char::from)
            .collect();
        Self(code)
    }

    /// Borrow the code text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ShareCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ShareCode> for String {
    fn from(value: ShareCode) -> Self {
        value.0
    }
}

impl TryFrom<String> for ShareCode {
    type Error = GroupValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Validate and normalise a group name.
pub fn normalise_group_name(name: &str) -> Result<String, GroupValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(GroupValidationError::EmptyName);
    }
    if trimmed.chars().count() > GROUP_NAME_MAX {
        return Err(GroupValidationError::NameTooLong {
            max: GROUP_NAME_MAX,
        });
    }
    Ok(trimmed.to_owned())
}

/// Unvalidated group fields, used when rehydrating from storage.
#[derive(Debug, Clone)]
pub struct GroupDraft {
    pub id: GroupId,
    pub name: String,
    pub share_code: ShareCode,
    pub creator_id: UserId,
    pub member_ids: Vec<UserId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub deletion_date: DateTime<Utc>,
}

/// Sharing group.
///
/// ## Invariants
/// - `created_at < expiry_date < deletion_date`.
/// - `creator_id` is always a member; members hold no duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    id: GroupId,
    name: String,
    share_code: ShareCode,
    creator_id: UserId,
    member_ids: Vec<UserId>,
    is_active: bool,
    created_at: DateTime<Utc>,
    expiry_date: DateTime<Utc>,
    deletion_date: DateTime<Utc>,
}

impl Group {
    /// Validate a draft and build the aggregate.
    pub fn new(draft: GroupDraft) -> Result<Self, GroupValidationError> {
        let GroupDraft {
            id,
            name,
            share_code,
            creator_id,
            member_ids,
            is_active,
            created_at,
            expiry_date,
            deletion_date,
        } = draft;

        let name = normalise_group_name(&name)?;
        if !(created_at < expiry_date && expiry_date < deletion_date) {
            return Err(GroupValidationError::TimestampsOutOfOrder);
        }

        let mut members: Vec<UserId> = Vec::with_capacity(member_ids.len());
        for member in member_ids {
            if !members.contains(&member) {
                members.push(member);
            }
        }
        if !members.contains(&creator_id) {
            return Err(GroupValidationError::CreatorNotMember);
        }

        Ok(Self {
            id,
            name,
            share_code,
            creator_id,
            member_ids: members,
            is_active,
            created_at,
            expiry_date,
            deletion_date,
        })
    }

    /// Open a brand-new group created by `creator` at `now`.
    ///
    /// # Examples
    /// ```
    /// use chrono::{TimeDelta, Utc};
    /// use photoshare::domain::{Group, ShareCode, UserId};
    ///
    /// let creator = UserId::random();
    /// let now = Utc::now();
    /// let code = ShareCode::new("abc123").expect("valid code");
    /// let group = Group::open("Trip", code, creator.clone(), now).expect("valid group");
    /// assert_eq!(group.expiry_date(), now + TimeDelta::days(30));
    /// assert_eq!(group.deletion_date(), now + TimeDelta::days(60));
    /// assert!(group.is_member(&creator));
    /// ```
    pub fn open(
        name: &str,
        share_code: ShareCode,
        creator_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Self, GroupValidationError> {
        let expiry_date = now + TimeDelta::days(ACTIVE_WINDOW_DAYS);
        let deletion_date = expiry_date + TimeDelta::days(GRACE_WINDOW_DAYS);
        Self::new(GroupDraft {
            id: GroupId::random(),
            name: name.to_owned(),
            share_code,
            member_ids: vec![creator_id.clone()],
            creator_id,
            is_active: true,
            created_at: now,
            expiry_date,
            deletion_date,
        })
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn share_code(&self) -> &ShareCode {
        &self.share_code
    }

    pub fn creator_id(&self) -> &UserId {
        &self.creator_id
    }

    pub fn member_ids(&self) -> &[UserId] {
        &self.member_ids
    }

    /// False once the creator has logically deleted the group.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expiry_date(&self) -> DateTime<Utc> {
        self.expiry_date
    }

    pub fn deletion_date(&self) -> DateTime<Utc> {
        self.deletion_date
    }

    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.member_ids.contains(user_id)
    }

    pub fn is_creator(&self, user_id: &UserId) -> bool {
        &self.creator_id == user_id
    }

    /// Return the group with `user_id` added; a no-op for existing members.
    pub fn with_member(mut self, user_id: UserId) -> Self {
        if !self.is_member(&user_id) {
            self.member_ids.push(user_id);
        }
        self
    }

    /// Return the group with its active flag cleared.
    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }
}
