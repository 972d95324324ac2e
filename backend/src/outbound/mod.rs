//! Outbound adapters implementing the domain ports.
//!
//! - **persistence**: PostgreSQL ledgers using Diesel
//! - **object_store**: S3 storage for image bytes
//! - **queue**: NATS JetStream edit request and response channel
//!
//! Adapters only translate between domain types and infrastructure
//! representations.

pub mod object_store;
pub mod persistence;
pub mod queue;
