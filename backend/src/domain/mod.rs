//! Domain primitives, access rules, and services.
//!
//! Purpose: model ephemeral sharing groups and their photos, decide who may
//! do what as time passes, and drive asynchronous photo edits to exactly one
//! terminal state. Adapters live in `crate::outbound`; this module only sees
//! them through [`ports`].
//!
//! Public surface:
//! - [`Group`], [`Photo`] and their ids: durable records.
//! - [`access_policy`]: pure lifecycle and permission checks.
//! - [`GroupService`], [`PhotoService`]: synchronous use cases.
//! - [`EditOrchestrator`], [`EditResponseConsumer`]: the edit protocol.
//! - [`CleanupSweeper`]: retention enforcement.
//! - [`AdminService`]: operator listing, immediate purge and totals.

pub mod access_policy;
pub mod admin_service;
pub mod cleanup_sweeper;
pub mod edit_message;
pub mod edit_orchestrator;
pub mod error;
pub mod group;
pub mod group_service;
pub mod photo;
pub mod photo_service;
pub mod ports;
pub mod user;

pub use self::admin_service::{AdminService, SystemStats};
pub use self::cleanup_sweeper::{CleanupSweeper, SweepReport, SweeperConfig};
pub use self::edit_message::{
    CorrelationId, EditRequestMessage, EditResponse, EditResponseParseError,
};
pub use self::edit_orchestrator::{
    EditNotice, EditOrchestrator, EditOrchestratorConfig, EditOutcome, EditResponseConsumer,
};
pub use self::error::{DomainError, DomainErrorValidationError, ErrorCode};
pub use self::group::{Group, GroupDraft, GroupId, GroupValidationError, ShareCode};
pub use self::group_service::GroupService;
pub use self::photo::{
    EditCompletion, EditStatus, Photo, PhotoDraft, PhotoId, PhotoValidationError, StorageKey,
};
pub use self::photo_service::{PhotoService, PhotoView, UploadFile};
pub use self::user::{UserId, UserIdValidationError};

/// Result alias for domain use cases.
pub type DomainResult<T> = Result<T, DomainError>;
