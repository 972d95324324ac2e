//! Object store adapters for image bytes.

mod s3_object_store;

pub use s3_object_store::S3ObjectStore;
