//! PostgreSQL ledger adapters using Diesel.
//!
//! Adapters translate between Diesel rows and domain aggregates only. Row
//! structs and the schema stay private to this module.

mod diesel_basic_error_mapping;
mod diesel_group_ledger;
mod diesel_photo_ledger;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_group_ledger::DieselGroupLedger;
pub use diesel_photo_ledger::DieselPhotoLedger;
pub use migrations::run_migrations;
pub use pool::{DbPool, PoolConfig, PoolError};
