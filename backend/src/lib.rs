//! Ephemeral photo-sharing groups with queued AI edits.

pub mod config;
pub mod domain;
pub mod outbound;

#[cfg(test)]
pub(crate) mod test_support;
