//! Filesystem bucket holding object content and metadata.
//!
//! Two on-disk layouts are supported:
//!
//! ```text
//! nested (default)                 direct
//! <root>/<bucket>/<key>/.content   <root>/<bucket>/<key>
//! <root>/<bucket>/<key>/metadata.json
//!                                  <root>/.metadata/<bucket>/<key>
//! ```
//!
//! Uploads are streamed into a temporary file beside the destination and
//! renamed into place only after the whole body has been received and synced,
//! so a failed or cancelled upload never replaces an existing object.
//!
//! Content and metadata are committed together under a per-key write lock.
//! Readers take the matching read lock while they open the content and load
//! its metadata, so both always describe the same upload.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use digest::Digest;
use futures::{Stream, StreamExt};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, trace, warn};

use crate::error::StoreError;
use crate::metadata::{DEFAULT_CONTENT_TYPE, ObjectMetadata};

/// File holding object content in the nested layout.
const CONTENT_FILE: &str = ".content";

/// File holding object metadata in the nested layout.
const METADATA_FILE: &str = "metadata.json";

/// Directory under the root holding metadata in the direct layout.
pub const METADATA_DIR: &str = ".metadata";

/// Prefix of in-progress upload files.
const UPLOAD_PREFIX: &str = ".upload-";

/// Read size used when streaming or hashing content.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// How objects are laid out under the bucket directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreLayout {
    /// Each key is a directory holding `.content` and `metadata.json`.
    #[default]
    Nested,
    /// Each key is a plain file; metadata lives under `<root>/.metadata`.
    Direct,
}

// ---------------------------------------------------------------------------
// StoredObject
// ---------------------------------------------------------------------------

/// An object opened for reading.
#[derive(Debug)]
pub struct StoredObject {
    /// The object's metadata.
    pub metadata: ObjectMetadata,
    /// The open content file, positioned at the start.
    pub file: fs::File,
}

impl StoredObject {
    /// Stream the content in fixed-size reads.
    pub fn into_stream(self) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
        futures::stream::unfold(Some(self.file), |file| async move {
            let mut file = file?;
            let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
            match file.read_buf(&mut buf).await {
                Ok(0) => None,
                Ok(_) => Some((Ok(buf.freeze()), Some(file))),
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Upload guard
// ---------------------------------------------------------------------------

/// Removes an unfinished upload file when dropped.
struct PendingUpload {
    path: Option<PathBuf>,
}

impl PendingUpload {
    fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    fn commit(&mut self) {
        self.path = None;
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => trace!(path = %path.display(), "removed unfinished upload"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove unfinished upload");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Key locks
// ---------------------------------------------------------------------------

/// Read/write locks keyed by object key, dropped once nobody holds them.
#[derive(Debug, Default)]
struct KeyLocks {
    locks: DashMap<String, Arc<RwLock<()>>>,
}

impl KeyLocks {
    fn lock_for(&self, key: &str) -> Arc<RwLock<()>> {
        Arc::clone(self.locks.entry(key.to_owned()).or_default().value())
    }

    async fn read(&self, key: &str) -> KeyGuard<'_, OwnedRwLockReadGuard<()>> {
        let guard = self.lock_for(key).read_owned().await;
        KeyGuard {
            locks: self,
            key: key.to_owned(),
            guard: Some(guard),
        }
    }

    async fn write(&self, key: &str) -> KeyGuard<'_, OwnedRwLockWriteGuard<()>> {
        let guard = self.lock_for(key).write_owned().await;
        KeyGuard {
            locks: self,
            key: key.to_owned(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}

/// A held key lock. Removes the map entry on release if it was the last user.
struct KeyGuard<'a, G> {
    locks: &'a KeyLocks,
    key: String,
    guard: Option<G>,
}

impl<G> Drop for KeyGuard<'_, G> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

// ---------------------------------------------------------------------------
// FileBucket
// ---------------------------------------------------------------------------

/// A bucket stored as a directory tree.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use bucketfs_store::{FileBucket, StoreLayout};
///
/// # tokio_test::block_on(async {
/// let dir = tempfile::tempdir().unwrap();
/// let bucket = FileBucket::open(dir.path(), "photos", StoreLayout::Nested)
///     .await
///     .unwrap();
///
/// let body = futures::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from("hello"))]);
/// let metadata = bucket
///     .put_object("a/b.txt", Some("text/plain"), body)
///     .await
///     .unwrap();
/// assert_eq!(metadata.digest, "5d41402abc4b2a76b9719d911017c592");
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct FileBucket {
    name: String,
    bucket_dir: PathBuf,
    metadata_dir: PathBuf,
    layout: StoreLayout,
    locks: Arc<KeyLocks>,
}

impl FileBucket {
    /// Open the bucket `name` under `root`, creating its directories.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidBucketName`] for unusable names, or
    /// [`StoreError::Io`] if the directories cannot be created.
    pub async fn open(
        root: impl AsRef<Path>,
        name: &str,
        layout: StoreLayout,
    ) -> Result<Self, StoreError> {
        let bucket = Self::at(root.as_ref(), name, layout)?;
        fs::create_dir_all(&bucket.bucket_dir).await?;
        if layout == StoreLayout::Direct {
            fs::create_dir_all(&bucket.metadata_dir).await?;
        }
        debug!(bucket = name, ?layout, "opened bucket");
        Ok(bucket)
    }

    /// Open the bucket `name` under `root` only if its directory exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidBucketName`] for unusable names, or
    /// [`StoreError::Io`] if the directory cannot be inspected.
    pub async fn open_existing(
        root: impl AsRef<Path>,
        name: &str,
        layout: StoreLayout,
    ) -> Result<Option<Self>, StoreError> {
        let bucket = Self::at(root.as_ref(), name, layout)?;
        match fs::metadata(&bucket.bucket_dir).await {
            Ok(meta) if meta.is_dir() => Ok(Some(bucket)),
            Ok(_) => Ok(None),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn at(root: &Path, name: &str, layout: StoreLayout) -> Result<Self, StoreError> {
        validate_bucket_name(name)?;
        Ok(Self {
            name: name.to_owned(),
            bucket_dir: root.join(name),
            metadata_dir: root.join(METADATA_DIR).join(name),
            layout,
            locks: Arc::default(),
        })
    }

    /// The bucket name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The on-disk layout.
    #[must_use]
    pub fn layout(&self) -> StoreLayout {
        self.layout
    }

    /// Stream `body` into the object `key` and record its metadata.
    ///
    /// The content is hashed (MD5) while it is written. If the body yields an
    /// error the upload is discarded and any previous object is left intact.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidKey`] for unusable keys
    /// - [`StoreError::Body`] if the body stream fails
    /// - [`StoreError::Io`] / [`StoreError::Metadata`] on storage failures
    pub async fn put_object<S, E>(
        &self,
        key: &str,
        content_type: Option<&str>,
        mut body: S,
    ) -> Result<ObjectMetadata, StoreError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        validate_key(key)?;
        let content_path = self.content_path(key);
        let dir = content_path
            .parent()
            .map_or_else(|| self.bucket_dir.clone(), Path::to_path_buf);
        fs::create_dir_all(&dir).await?;

        let mut upload = PendingUpload {
            path: Some(dir.join(format!("{UPLOAD_PREFIX}{}", uuid::Uuid::new_v4()))),
        };
        let mut file = fs::File::create(upload.path()).await?;
        let mut hasher = md5::Md5::new();
        let mut content_length = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(StoreError::body)?;
            Digest::update(&mut hasher, &chunk);
            file.write_all(&chunk).await?;
            content_length += chunk.len() as u64;
        }
        file.sync_all().await?;
        drop(file);

        let metadata = ObjectMetadata {
            digest: hex::encode(Digest::finalize(hasher)),
            content_length,
            content_type: content_type
                .filter(|ct| !ct.is_empty())
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_owned(),
            mod_time: chrono::Utc::now().timestamp_millis(),
        };
        let mut staged = self.stage_metadata(key, &metadata).await?;

        let _guard = self.locks.write(key).await;
        fs::rename(upload.path(), &content_path).await?;
        upload.commit();
        self.commit_metadata(key, &mut staged).await?;

        debug!(bucket = %self.name, key, size = content_length, "stored object");
        Ok(metadata)
    }

    /// Open the object `key` for reading.
    ///
    /// Missing metadata for existing content is rebuilt from the file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] for unusable keys, or a storage error.
    pub async fn get_object(&self, key: &str) -> Result<Option<StoredObject>, StoreError> {
        validate_key(key)?;
        let _guard = self.locks.read(key).await;
        let Some(file) = open_content(&self.content_path(key)).await? else {
            return Ok(None);
        };

        let metadata = match self.read_metadata(key).await? {
            Some(metadata) => metadata,
            None => self.rebuild_metadata(key).await?,
        };
        Ok(Some(StoredObject { metadata, file }))
    }

    /// Look up the metadata for `key`, rebuilding it if only content exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] for unusable keys, or a storage error.
    pub async fn get_metadata(&self, key: &str) -> Result<Option<ObjectMetadata>, StoreError> {
        validate_key(key)?;
        let _guard = self.locks.read(key).await;
        if !is_file(&self.content_path(key)).await? {
            return Ok(None);
        }
        match self.read_metadata(key).await? {
            Some(metadata) => Ok(Some(metadata)),
            None => self.rebuild_metadata(key).await.map(Some),
        }
    }

    /// Write the metadata document for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] for unusable keys, or a storage error.
    pub async fn put_metadata(&self, key: &str, metadata: &ObjectMetadata) -> Result<(), StoreError> {
        validate_key(key)?;
        let mut staged = self.stage_metadata(key, metadata).await?;
        let _guard = self.locks.write(key).await;
        self.commit_metadata(key, &mut staged).await
    }

    /// Write `metadata` to a temporary file beside its final location.
    async fn stage_metadata(
        &self,
        key: &str,
        metadata: &ObjectMetadata,
    ) -> Result<PendingUpload, StoreError> {
        let path = self.metadata_path(key);
        let dir = path
            .parent()
            .map_or_else(|| self.metadata_dir.clone(), Path::to_path_buf);
        fs::create_dir_all(&dir).await?;

        let staged = PendingUpload {
            path: Some(dir.join(format!("{UPLOAD_PREFIX}{}", uuid::Uuid::new_v4()))),
        };
        let mut file = fs::File::create(staged.path()).await?;
        file.write_all(&serde_json::to_vec(metadata)?).await?;
        file.sync_all().await?;
        Ok(staged)
    }

    /// Move staged metadata into place. The caller holds the key's lock.
    ///
    /// If the rename fails the previous document is removed as well, so the
    /// next read rebuilds metadata from whatever content is committed.
    async fn commit_metadata(&self, key: &str, staged: &mut PendingUpload) -> Result<(), StoreError> {
        let path = self.metadata_path(key);
        if let Err(e) = fs::rename(staged.path(), &path).await {
            if let Err(remove_err) = remove_if_exists(&path).await {
                warn!(bucket = %self.name, key, error = %remove_err, "failed to remove stale metadata");
            }
            return Err(e.into());
        }
        staged.commit();
        Ok(())
    }

    /// Delete the object `key`. Deleting a missing object succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] for unusable keys, or a storage error.
    pub async fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        let _guard = self.locks.write(key).await;
        remove_if_exists(&self.content_path(key)).await?;
        remove_if_exists(&self.metadata_path(key)).await?;

        if self.layout == StoreLayout::Nested {
            // Leaves the directory in place if it still holds nested keys.
            let _ = fs::remove_dir(self.bucket_dir.join(key)).await;
        }
        trace!(bucket = %self.name, key, "deleted object");
        Ok(())
    }

    fn content_path(&self, key: &str) -> PathBuf {
        match self.layout {
            StoreLayout::Nested => self.bucket_dir.join(key).join(CONTENT_FILE),
            StoreLayout::Direct => self.bucket_dir.join(key),
        }
    }

    fn metadata_path(&self, key: &str) -> PathBuf {
        match self.layout {
            StoreLayout::Nested => self.bucket_dir.join(key).join(METADATA_FILE),
            StoreLayout::Direct => self.metadata_dir.join(key),
        }
    }

    async fn read_metadata(&self, key: &str) -> Result<Option<ObjectMetadata>, StoreError> {
        match fs::read(self.metadata_path(key)).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Recompute metadata from the content file and persist it.
    async fn rebuild_metadata(&self, key: &str) -> Result<ObjectMetadata, StoreError> {
        let path = self.content_path(key);
        let mut file = fs::File::open(&path).await?;
        let stat = file.metadata().await?;

        let mut hasher = md5::Md5::new();
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            Digest::update(&mut hasher, &buf[..n]);
        }

        let mod_time = stat
            .modified()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).timestamp_millis())
            .unwrap_or_default();
        let metadata = ObjectMetadata {
            digest: hex::encode(Digest::finalize(hasher)),
            content_length: stat.len(),
            content_type: DEFAULT_CONTENT_TYPE.to_owned(),
            mod_time,
        };

        debug!(bucket = %self.name, key, "rebuilt missing object metadata");
        let mut staged = self.stage_metadata(key, &metadata).await?;
        self.commit_metadata(key, &mut staged).await?;
        Ok(metadata)
    }
}

async fn open_content(path: &Path) -> Result<Option<fs::File>, StoreError> {
    match fs::File::open(path).await {
        Ok(file) => {
            if file.metadata().await?.is_file() {
                Ok(Some(file))
            } else {
                Ok(None)
            }
        }
        Err(e) if is_missing(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn is_file(path: &Path) -> Result<bool, StoreError> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if is_missing(&e) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if is_missing(&e) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// A path component that is a regular file where a directory was expected
/// reports `NotADirectory`, which is as good as missing here.
fn is_missing(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
    )
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check that `key` maps to a path inside the bucket.
///
/// Rejects empty keys, absolute keys, empty / `.` / `..` segments, NUL bytes,
/// and segments that collide with the store's own bookkeeping files.
///
/// # Errors
///
/// Returns [`StoreError::InvalidKey`] describing the problem.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let invalid = |reason: &str| Err(StoreError::InvalidKey(format!("{key:?}: {reason}")));

    if key.is_empty() {
        return invalid("empty key");
    }
    if key.len() > 1024 {
        return invalid("key longer than 1024 bytes");
    }
    if key.contains('\0') || key.contains('\\') {
        return invalid("forbidden character");
    }
    if key.starts_with('/') {
        return invalid("absolute key");
    }
    for segment in key.split('/') {
        match segment {
            "" => return invalid("empty path segment"),
            "." | ".." => return invalid("relative path segment"),
            CONTENT_FILE | METADATA_FILE => return invalid("reserved name"),
            s if s.starts_with(UPLOAD_PREFIX) => return invalid("reserved name"),
            _ => {}
        }
    }
    Ok(())
}

/// Check that `name` is usable as a single bucket directory.
///
/// # Errors
///
/// Returns [`StoreError::InvalidBucketName`] describing the problem.
pub fn validate_bucket_name(name: &str) -> Result<(), StoreError> {
    let invalid = |reason: &str| Err(StoreError::InvalidBucketName(format!("{name:?}: {reason}")));

    if name.is_empty() || name.len() > 255 {
        return invalid("length must be between 1 and 255");
    }
    if name.starts_with('.') {
        return invalid("must not start with '.'");
    }
    if name.contains(['/', '\\', '\0']) {
        return invalid("forbidden character");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";

    fn body_of(
        parts: &[&'static str],
    ) -> impl Stream<Item = Result<Bytes, Infallible>> + Unpin + use<> {
        let parts: Vec<_> = parts
            .iter()
            .map(|p| Ok(Bytes::from_static(p.as_bytes())))
            .collect();
        futures::stream::iter(parts)
    }

    async fn read_all(object: StoredObject) -> Vec<u8> {
        let mut out = Vec::new();
        let mut stream = std::pin::pin!(object.into_stream());
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    async fn open(layout: StoreLayout) -> (tempfile::TempDir, FileBucket) {
        let dir = tempfile::tempdir().unwrap();
        let bucket = FileBucket::open(dir.path(), "bucket", layout).await.unwrap();
        (dir, bucket)
    }

    #[tokio::test]
    async fn test_should_put_and_get_object_nested() {
        let (dir, bucket) = open(StoreLayout::Nested).await;

        let metadata = bucket
            .put_object("docs/hello.txt", Some("text/plain"), body_of(&["hel", "lo"]))
            .await
            .unwrap();
        assert_eq!(metadata.digest, HELLO_MD5);
        assert_eq!(metadata.content_length, 5);
        assert_eq!(metadata.content_type, "text/plain");

        assert!(dir.path().join("bucket/docs/hello.txt/.content").is_file());
        assert!(dir.path().join("bucket/docs/hello.txt/metadata.json").is_file());

        let object = bucket.get_object("docs/hello.txt").await.unwrap().unwrap();
        assert_eq!(object.metadata, metadata);
        assert_eq!(read_all(object).await, b"hello");
    }

    #[tokio::test]
    async fn test_should_put_and_get_object_direct() {
        let (dir, bucket) = open(StoreLayout::Direct).await;

        bucket
            .put_object("docs/hello.txt", None, body_of(&["hello"]))
            .await
            .unwrap();

        assert!(dir.path().join("bucket/docs/hello.txt").is_file());
        assert!(dir.path().join(".metadata/bucket/docs/hello.txt").is_file());

        let metadata = bucket.get_metadata("docs/hello.txt").await.unwrap().unwrap();
        assert_eq!(metadata.content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(metadata.digest, HELLO_MD5);
    }

    #[tokio::test]
    async fn test_should_return_none_for_missing_object() {
        let (_dir, bucket) = open(StoreLayout::Nested).await;
        assert!(bucket.get_object("missing").await.unwrap().is_none());
        assert!(bucket.get_metadata("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_should_replace_existing_object() {
        let (_dir, bucket) = open(StoreLayout::Nested).await;
        bucket.put_object("k", None, body_of(&["first"])).await.unwrap();
        bucket.put_object("k", None, body_of(&["hello"])).await.unwrap();

        let object = bucket.get_object("k").await.unwrap().unwrap();
        assert_eq!(object.metadata.digest, HELLO_MD5);
        assert_eq!(read_all(object).await, b"hello");
    }

    #[tokio::test]
    async fn test_should_discard_upload_when_body_fails() {
        let (dir, bucket) = open(StoreLayout::Nested).await;
        bucket.put_object("k", None, body_of(&["hello"])).await.unwrap();

        let failing = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::other("chunk signature mismatch")),
        ]);
        let err = bucket.put_object("k", None, failing).await.unwrap_err();
        assert!(matches!(err, StoreError::Body(_)));
        assert!(err.body_error().is_some());

        let object = bucket.get_object("k").await.unwrap().unwrap();
        assert_eq!(read_all(object).await, b"hello");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("bucket/k"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(UPLOAD_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_should_not_create_object_when_first_upload_fails() {
        let (_dir, bucket) = open(StoreLayout::Direct).await;
        let failing = futures::stream::iter(vec![Err::<Bytes, _>(std::io::Error::other("boom"))]);

        assert!(bucket.put_object("new", None, failing).await.is_err());
        assert!(bucket.get_object("new").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_should_rebuild_missing_metadata() {
        let (dir, bucket) = open(StoreLayout::Direct).await;
        std::fs::write(dir.path().join("bucket/dropped-in.txt"), b"hello").unwrap();

        let object = bucket.get_object("dropped-in.txt").await.unwrap().unwrap();
        assert_eq!(object.metadata.digest, HELLO_MD5);
        assert_eq!(object.metadata.content_length, 5);
        assert_eq!(object.metadata.content_type, DEFAULT_CONTENT_TYPE);
        assert!(object.metadata.mod_time > 0);
        assert!(dir.path().join(".metadata/bucket/dropped-in.txt").is_file());
    }

    #[tokio::test]
    async fn test_should_delete_object_and_metadata() {
        let (dir, bucket) = open(StoreLayout::Nested).await;
        bucket.put_object("a/b", None, body_of(&["x"])).await.unwrap();

        bucket.delete_object("a/b").await.unwrap();
        assert!(bucket.get_object("a/b").await.unwrap().is_none());
        assert!(!dir.path().join("bucket/a/b").exists());

        // Deleting again is not an error.
        bucket.delete_object("a/b").await.unwrap();
    }

    #[tokio::test]
    async fn test_should_keep_nested_keys_when_deleting_parent() {
        let (_dir, bucket) = open(StoreLayout::Nested).await;
        bucket.put_object("a", None, body_of(&["parent"])).await.unwrap();
        bucket.put_object("a/b", None, body_of(&["child"])).await.unwrap();

        bucket.delete_object("a").await.unwrap();
        assert!(bucket.get_object("a").await.unwrap().is_none());
        assert!(bucket.get_object("a/b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_should_reject_traversal_keys() {
        let (_dir, bucket) = open(StoreLayout::Nested).await;
        for key in ["", "/etc/passwd", "../escape", "a/../../b", "a//b", "a/./b", "a/.content"] {
            assert!(
                matches!(
                    bucket.put_object(key, None, body_of(&["x"])).await,
                    Err(StoreError::InvalidKey(_))
                ),
                "{key:?} should be rejected"
            );
        }
    }

    fn payload_of(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn chunked_body(
        payload: &[u8],
    ) -> impl Stream<Item = Result<Bytes, Infallible>> + Unpin + Send + use<> {
        let chunks: Vec<_> = payload
            .chunks(4096)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        futures::stream::iter(chunks)
    }

    async fn assert_consistent(bucket: &FileBucket, key: &str) {
        let object = bucket.get_object(key).await.unwrap().unwrap();
        let metadata = object.metadata.clone();
        let data = read_all(object).await;
        assert_eq!(metadata.content_length, data.len() as u64);
        assert_eq!(metadata.digest, hex::encode(<md5::Md5 as Digest>::digest(&data)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_should_keep_content_and_metadata_consistent_under_concurrent_puts() {
        for layout in [StoreLayout::Nested, StoreLayout::Direct] {
            let (_dir, bucket) = open(layout).await;

            let mut tasks = Vec::new();
            for round in 0..16usize {
                let writer = bucket.clone();
                tasks.push(tokio::spawn(async move {
                    let payload = payload_of(1000 + round * 3000);
                    writer
                        .put_object("shared", None, chunked_body(&payload))
                        .await
                        .unwrap();
                }));
                let reader = bucket.clone();
                tasks.push(tokio::spawn(async move {
                    if reader.get_metadata("shared").await.unwrap().is_some() {
                        assert_consistent(&reader, "shared").await;
                    }
                }));
            }
            for task in tasks {
                task.await.unwrap();
            }

            assert_consistent(&bucket, "shared").await;
            let head = bucket.get_metadata("shared").await.unwrap().unwrap();
            let object = bucket.get_object("shared").await.unwrap().unwrap();
            assert_eq!(head, object.metadata);
            assert_eq!(bucket.locks.len(), 0);
        }
    }

    #[tokio::test]
    async fn test_should_release_key_locks_after_use() {
        let (_dir, bucket) = open(StoreLayout::Nested).await;
        bucket.put_object("a", None, body_of(&["x"])).await.unwrap();
        bucket.get_object("a").await.unwrap();
        bucket.delete_object("a").await.unwrap();
        assert_eq!(bucket.locks.len(), 0);
    }

    #[tokio::test]
    async fn test_should_open_existing_bucket_only() {
        let dir = tempfile::tempdir().unwrap();
        assert!(
            FileBucket::open_existing(dir.path(), "absent", StoreLayout::Nested)
                .await
                .unwrap()
                .is_none()
        );
        assert!(!dir.path().join("absent").exists());

        FileBucket::open(dir.path(), "present", StoreLayout::Nested)
            .await
            .unwrap();
        assert!(
            FileBucket::open_existing(dir.path(), "present", StoreLayout::Nested)
                .await
                .unwrap()
                .is_some()
        );
        assert!(matches!(
            FileBucket::open_existing(dir.path(), "..", StoreLayout::Nested).await,
            Err(StoreError::InvalidBucketName(_))
        ));
    }

    #[test]
    fn test_should_validate_bucket_names() {
        assert!(validate_bucket_name("photos").is_ok());
        assert!(validate_bucket_name("my.bucket-1").is_ok());
        for name in ["", ".metadata", "..", "a/b", "a\\b"] {
            assert!(validate_bucket_name(name).is_err(), "{name:?} should be rejected");
        }
    }

    #[tokio::test]
    async fn test_should_hash_large_object_across_reads() {
        let (_dir, bucket) = open(StoreLayout::Nested).await;
        let payload = vec![b'a'; READ_CHUNK_SIZE * 2 + 7];
        let body = futures::stream::iter(
            payload
                .chunks(1000)
                .map(|c| Ok::<_, Infallible>(Bytes::copy_from_slice(c)))
                .collect::<Vec<_>>(),
        );
        let metadata = bucket.put_object("big", None, body).await.unwrap();

        let expected = hex::encode(<md5::Md5 as Digest>::digest(&payload));
        assert_eq!(metadata.digest, expected);
        let object = bucket.get_object("big").await.unwrap().unwrap();
        assert_eq!(read_all(object).await, payload);
    }
}
