//! Opens buckets by name under a shared data directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::bucket::{FileBucket, StoreLayout, validate_bucket_name};
use crate::error::StoreError;

/// Hands out [`FileBucket`]s rooted at one data directory.
///
/// Buckets are created on first write and cached for later requests. Reads
/// and deletes go through [`BucketProvider::existing_bucket`], which never
/// touches the disk for unknown names.
#[derive(Debug)]
pub struct BucketProvider {
    root: PathBuf,
    layout: StoreLayout,
    buckets: DashMap<String, Arc<FileBucket>>,
}

impl BucketProvider {
    /// Create a provider for buckets under `root`.
    pub fn new(root: impl Into<PathBuf>, layout: StoreLayout) -> Self {
        Self {
            root: root.into(),
            layout,
            buckets: DashMap::new(),
        }
    }

    /// The data directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The layout used for every bucket.
    #[must_use]
    pub fn layout(&self) -> StoreLayout {
        self.layout
    }

    /// Open the bucket `name`, creating its directories if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidBucketName`] for unusable names, or
    /// [`StoreError::Io`] if the bucket directory cannot be created.
    pub async fn bucket(&self, name: &str) -> Result<Arc<FileBucket>, StoreError> {
        validate_bucket_name(name)?;
        if let Some(bucket) = self.buckets.get(name) {
            return Ok(Arc::clone(bucket.value()));
        }

        let bucket = Arc::new(FileBucket::open(&self.root, name, self.layout).await?);
        Ok(self.cache(name, bucket))
    }

    /// Open the bucket `name` only if it already exists on disk.
    ///
    /// Unlike [`BucketProvider::bucket`] this never creates directories, and
    /// unknown names are not cached.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidBucketName`] for unusable names, or
    /// [`StoreError::Io`] if the bucket directory cannot be inspected.
    pub async fn existing_bucket(&self, name: &str) -> Result<Option<Arc<FileBucket>>, StoreError> {
        validate_bucket_name(name)?;
        if let Some(bucket) = self.buckets.get(name) {
            return Ok(Some(Arc::clone(bucket.value())));
        }

        match FileBucket::open_existing(&self.root, name, self.layout).await? {
            Some(bucket) => Ok(Some(self.cache(name, Arc::new(bucket)))),
            None => Ok(None),
        }
    }

    fn cache(&self, name: &str, bucket: Arc<FileBucket>) -> Arc<FileBucket> {
        Arc::clone(
            self.buckets
                .entry(name.to_owned())
                .or_insert(bucket)
                .value(),
        )
    }

    #[cfg(test)]
    fn cached(&self) -> usize {
        self.buckets.len()
    }
}
