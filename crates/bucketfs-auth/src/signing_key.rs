//! SigV4 signing key derivation and HMAC helpers.
//!
//! ```text
//! DateKey              = HMAC-SHA256("AWS4" + secret_key, date)
//! DateRegionKey        = HMAC-SHA256(DateKey, region)
//! DateRegionServiceKey = HMAC-SHA256(DateRegionKey, service)
//! SigningKey           = HMAC-SHA256(DateRegionServiceKey, "aws4_request")
//! ```

use std::fmt;

use hmac::{Hmac, KeyInit, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Terminator of every SigV4 credential scope.
pub const SCOPE_TERMINATOR: &str = "aws4_request";

/// Hex SHA-256 of the empty byte string.
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// A derived SigV4 signing key, scoped to one date, region, and service.
///
/// The key bytes are never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Derive the signing key for `(secret_key, date, region, service)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bucketfs_auth::signing_key::SigningKey;
    ///
    /// let key = SigningKey::derive(
    ///     "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY",
    ///     "20130524",
    ///     "us-east-1",
    ///     "s3",
    /// );
    /// assert_eq!(key.as_bytes().len(), 32);
    /// ```
    #[must_use]
    pub fn derive(secret_key: &str, date: &str, region: &str, service: &str) -> Self {
        let date_key = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date.as_bytes());
        let date_region_key = hmac_sha256(&date_key, region.as_bytes());
        let date_region_service_key = hmac_sha256(&date_region_key, service.as_bytes());
        Self(hmac_sha256(
            &date_region_service_key,
            SCOPE_TERMINATOR.as_bytes(),
        ))
    }

    /// Compute the hex-encoded HMAC-SHA256 signature of `data`.
    #[must_use]
    pub fn sign(&self, data: &str) -> String {
        hex::encode(hmac_sha256(&self.0, data.as_bytes()))
    }

    /// The raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey([REDACTED])")
    }
}

/// Build the credential scope `date/region/service/aws4_request`.
#[must_use]
pub fn credential_scope(date: &str, region: &str, service: &str) -> String {
    format!("{date}/{region}/{service}/{SCOPE_TERMINATOR}")
}

/// Compute HMAC-SHA256 and return the raw bytes.
#[must_use]
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can accept keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Compute the SHA-256 hash of the given payload and return it as a hex string.
///
/// # Examples
///
/// ```
/// use bucketfs_auth::signing_key::hash_payload;
///
/// assert_eq!(
///     hash_payload(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
#[must_use]
pub fn hash_payload(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Compare two signatures without short-circuiting on the first differing byte.
#[must_use]
pub fn signatures_match(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}
