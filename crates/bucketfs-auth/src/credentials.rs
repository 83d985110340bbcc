//! Credential records and the credential store.
//!
//! This module defines the [`CredentialStore`] trait for resolving credentials
//! from access key IDs, along with [`InMemoryCredentialStore`], a concurrent
//! map that is safe to share across request tasks without external locking.

use std::fmt;

use dashmap::DashMap;

/// An access key / secret key pair.
///
/// Credentials are immutable once issued. Their identity is the access key.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_key: String,
    secret_key: String,
}

impl Credential {
    /// Create a credential from an access key and its secret key.
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// The public access key ID.
    #[must_use]
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// The secret key used to derive signing keys.
    #[must_use]
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key", &self.access_key)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// Mapping from access key ID to [`Credential`].
///
/// Implementations own their synchronization: callers may invoke [`get`] and
/// [`put`] concurrently from any number of request tasks.
///
/// [`get`]: CredentialStore::get
/// [`put`]: CredentialStore::put
pub trait CredentialStore: Send + Sync {
    /// Look up the credential for `access_key`.
    fn get(&self, access_key: &str) -> Option<Credential>;

    /// Insert or replace the credential keyed by its access key. Last write wins.
    fn put(&self, credential: Credential);
}

/// A concurrent in-memory credential store backed by a [`DashMap`].
///
/// # Examples
///
/// ```
/// use bucketfs_auth::credentials::{Credential, CredentialStore, InMemoryCredentialStore};
///
/// let store = InMemoryCredentialStore::new();
/// store.put(Credential::new("AKIDEXAMPLE", "secret1234"));
///
/// let credential = store.get("AKIDEXAMPLE").unwrap();
/// assert_eq!(credential.secret_key(), "secret1234");
/// assert!(store.get("UNKNOWN").is_none());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    credentials: DashMap<String, Credential>,
}

impl InMemoryCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from `(access_key, secret_key)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        pairs
            .into_iter()
            .map(|(access_key, secret_key)| Credential::new(access_key, secret_key))
            .collect()
    }

    /// Remove the credential for `access_key`, returning it if present.
    pub fn remove(&self, access_key: &str) -> Option<Credential> {
        self.credentials.remove(access_key).map(|(_, c)| c)
    }

    /// Number of stored credentials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Whether the store holds no credentials.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

impl FromIterator<Credential> for InMemoryCredentialStore {
    fn from_iter<I: IntoIterator<Item = Credential>>(iter: I) -> Self {
        let store = Self::new();
        for credential in iter {
            store.put(credential);
        }
        store
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn get(&self, access_key: &str) -> Option<Credential> {
        self.credentials.get(access_key).map(|entry| entry.clone())
    }

    fn put(&self, credential: Credential) {
        self.credentials
            .insert(credential.access_key.clone(), credential);
    }
}
