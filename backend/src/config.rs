//! Process settings loaded via OrthoConfig.
//!
//! Values come from CLI flags, `PHOTOSHARE_*` environment variables and
//! configuration files. Tuning knobs carry defaults so an empty load
//! succeeds; connection targets are checked when the binary asks for them.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::{EditOrchestratorConfig, SweeperConfig};

const DEFAULT_EDIT_REQUEST_SUBJECT: &str = "image_edit_request";
const DEFAULT_EDIT_RESPONSE_SUBJECT: &str = "image_edit_response";
const DEFAULT_EDIT_STREAM_NAME: &str = "image_edits";
const DEFAULT_EDIT_CONSUMER_NAME: &str = "photoshare-edit-responses";

/// A connection target the process cannot start without.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing required setting `{0}` (set PHOTOSHARE_{upper})", upper = .0.to_uppercase())]
pub struct MissingSetting(pub &'static str);

/// Settings for the photoshare service.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "PHOTOSHARE")]
pub struct AppSettings {
    /// PostgreSQL connection string for the ledger.
    pub database_url: Option<String>,
    /// Upper bound on pooled database connections.
    #[ortho_config(default = 10)]
    pub db_max_connections: u32,
    /// NATS server URL.
    pub nats_url: Option<String>,
    /// Subject edit requests are published on.
    pub edit_request_subject: Option<String>,
    /// Subject edit responses arrive on.
    pub edit_response_subject: Option<String>,
    /// JetStream stream covering both edit subjects.
    pub edit_stream_name: Option<String>,
    /// Durable consumer name shared by all replicas.
    pub edit_consumer_name: Option<String>,
    /// Bucket holding image bytes.
    pub s3_bucket: Option<String>,
    #[ortho_config(default = 3600)]
    pub signed_url_ttl_secs: u64,
    #[ortho_config(default = 60)]
    pub edit_wait_timeout_secs: u64,
    #[ortho_config(default = 1000)]
    pub edit_wait_poll_millis: u64,
    /// Deliveries buffered between the response pump and finalize loop.
    #[ortho_config(default = 64)]
    pub response_buffer: usize,
    #[ortho_config(default = 86400)]
    pub sweep_interval_secs: u64,
    /// Age after which a still-pending edit is failed by the sweeper.
    #[ortho_config(default = 86400)]
    pub pending_edit_ttl_secs: u64,
}

impl AppSettings {
    pub fn database_url(&self) -> Result<&str, MissingSetting> {
        self.database_url
            .as_deref()
            .ok_or(MissingSetting("database_url"))
    }

    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections.max(1)
    }

    pub fn nats_url(&self) -> Result<&str, MissingSetting> {
        self.nats_url.as_deref().ok_or(MissingSetting("nats_url"))
    }

    pub fn s3_bucket(&self) -> Result<&str, MissingSetting> {
        self.s3_bucket.as_deref().ok_or(MissingSetting("s3_bucket"))
    }

    pub fn edit_request_subject(&self) -> &str {
        self.edit_request_subject
            .as_deref()
            .unwrap_or(DEFAULT_EDIT_REQUEST_SUBJECT)
    }

    pub fn edit_response_subject(&self) -> &str {
        self.edit_response_subject
            .as_deref()
            .unwrap_or(DEFAULT_EDIT_RESPONSE_SUBJECT)
    }

    pub fn edit_stream_name(&self) -> &str {
        self.edit_stream_name
            .as_deref()
            .unwrap_or(DEFAULT_EDIT_STREAM_NAME)
    }

    pub fn edit_consumer_name(&self) -> &str {
        self.edit_consumer_name
            .as_deref()
            .unwrap_or(DEFAULT_EDIT_CONSUMER_NAME)
    }

    /// Lifetime of read URLs handed to clients.
    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }

    /// How long a synchronous edit request waits for its response.
    pub fn edit_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.edit_wait_timeout_secs)
    }

    pub fn edit_wait_poll_interval(&self) -> Duration {
        Duration::from_millis(self.edit_wait_poll_millis.max(1))
    }

    pub fn response_buffer(&self) -> usize {
        self.response_buffer.max(1)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn pending_edit_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_edit_ttl_secs)
    }

    pub fn orchestrator_config(&self) -> EditOrchestratorConfig {
        EditOrchestratorConfig {
            wait_poll_interval: self.edit_wait_poll_interval(),
            ..EditOrchestratorConfig::default()
        }
    }

    pub fn sweeper_config(&self) -> SweeperConfig {
        SweeperConfig {
            interval: self.sweep_interval(),
            pending_edit_ttl: self.pending_edit_ttl(),
        }
    }
}
