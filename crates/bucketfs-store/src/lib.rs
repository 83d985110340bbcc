//! Filesystem object storage for bucketfs.
//!
//! Objects are stored as plain files under `<data_dir>/<bucket>`, each with a
//! JSON metadata document recording its MD5 digest, size, content type, and
//! modification time. Bodies are streamed to disk; nothing is buffered whole.
//!
//! The store never authenticates data. Callers hand it byte streams that have
//! already been verified and surface any stream error through
//! [`StoreError::Body`], which aborts the write.

pub mod bucket;
pub mod error;
pub mod metadata;
pub mod provider;

pub use bucket::{FileBucket, StoreLayout, StoredObject, validate_key};
pub use error::StoreError;
pub use metadata::ObjectMetadata;
pub use provider::BucketProvider;
