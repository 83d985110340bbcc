//! AWS Signature Version 4 header verification.
//!
//! This module implements the SigV4 verification flow:
//!
//! 1. Parse the `Authorization` header into the access key, credential scope,
//!    signed headers, and supplied signature.
//! 2. Resolve the access key through the injected [`CredentialStore`].
//! 3. Reject requests whose timestamp falls outside the clock skew window.
//! 4. Reconstruct the canonical request and the string to sign, derive the
//!    signing key, and compute the expected signature.
//! 5. Compare the expected and supplied signatures in constant time.
//!
//! The expected signature of a successful verification is the seed of the
//! chunk signature chain when the payload is streamed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::canonical::{
    SIGNING_ALGORITHM, build_canonical_request, build_string_to_sign, hash_canonical_request,
};
use crate::chunked::ChunkSigningContext;
use crate::credentials::CredentialStore;
use crate::error::AuthError;
use crate::signing_key::{
    EMPTY_PAYLOAD_SHA256, SCOPE_TERMINATOR, SigningKey, credential_scope, signatures_match,
};

/// Payload hash sentinel announcing a chunk-signed streaming body.
pub const STREAMING_PAYLOAD: &str = "STREAMING-AWS4-HMAC-SHA256-PAYLOAD";

/// Payload hash sentinel for a body that is not covered by the signature.
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Header carrying the payload hash token.
pub const CONTENT_SHA256_HEADER: &str = "x-amz-content-sha256";

/// Header carrying the request timestamp.
pub const AMZ_DATE_HEADER: &str = "x-amz-date";

/// Default tolerance between the request timestamp and the server clock.
pub const DEFAULT_MAX_CLOCK_SKEW: Duration = Duration::from_secs(15 * 60);

/// `strftime` format of the `x-amz-date` header (ISO 8601 basic).
pub(crate) const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

const SCOPE_DATE_FORMAT: &str = "%Y%m%d";

/// Parsed components of an AWS SigV4 `Authorization` header.
///
/// Format:
/// ```text
/// AWS4-HMAC-SHA256 Credential=AKID/20130524/us-east-1/s3/aws4_request,
///   SignedHeaders=host;x-amz-content-sha256;x-amz-date,
///   Signature=<hex-signature>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAuth {
    /// The access key ID.
    pub access_key: String,
    /// The date component of the credential scope (YYYYMMDD).
    pub date: String,
    /// The region from the credential scope.
    pub region: String,
    /// The service from the credential scope.
    pub service: String,
    /// The signed header names, lowercased, in the order the client sent them.
    pub signed_headers: Vec<String>,
    /// The hex-encoded signature supplied by the client.
    pub signature: String,
}

/// Parse an AWS SigV4 `Authorization` header value into its components.
///
/// # Errors
///
/// Returns [`AuthError::MalformedAuthHeader`] if the algorithm is not
/// `AWS4-HMAC-SHA256`, a component is absent or empty, or the credential does
/// not have the `<key>/<date>/<region>/<service>/aws4_request` shape.
///
/// # Examples
///
/// ```
/// use bucketfs_auth::sigv4::parse_authorization_header;
///
/// let parsed = parse_authorization_header(
///     "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20130524/us-east-1/s3/aws4_request, \
///      SignedHeaders=host;x-amz-date, Signature=abcd",
/// )
/// .unwrap();
/// assert_eq!(parsed.access_key, "AKIDEXAMPLE");
/// assert_eq!(parsed.signed_headers, vec!["host", "x-amz-date"]);
/// ```
pub fn parse_authorization_header(header: &str) -> Result<ParsedAuth, AuthError> {
    let (algorithm, rest) = header
        .trim()
        .split_once(' ')
        .ok_or_else(|| AuthError::malformed("missing credential components"))?;

    if algorithm != SIGNING_ALGORITHM {
        return Err(AuthError::malformed(format!(
            "unsupported algorithm '{algorithm}'"
        )));
    }

    let mut credential = None;
    let mut signed_headers = None;
    let mut signature = None;

    for part in rest.split(',') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix("Credential=") {
            credential = Some(value);
        } else if let Some(value) = part.strip_prefix("SignedHeaders=") {
            signed_headers = Some(value);
        } else if let Some(value) = part.strip_prefix("Signature=") {
            signature = Some(value);
        }
    }

    let credential = credential
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError::malformed("missing Credential"))?;
    let signed_headers = signed_headers
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError::malformed("missing SignedHeaders"))?;
    let signature = signature
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError::malformed("missing Signature"))?;

    let scope: Vec<&str> = credential.split('/').collect();
    let [access_key, date, region, service, terminator] = scope.as_slice() else {
        return Err(AuthError::malformed("invalid credential scope"));
    };
    if *terminator != SCOPE_TERMINATOR
        || [access_key, date, region, service]
            .iter()
            .any(|c| c.is_empty())
    {
        return Err(AuthError::malformed("invalid credential scope"));
    }

    Ok(ParsedAuth {
        access_key: (*access_key).to_owned(),
        date: (*date).to_owned(),
        region: (*region).to_owned(),
        service: (*service).to_owned(),
        signed_headers: signed_headers
            .split(';')
            .map(|h| h.trim().to_ascii_lowercase())
            .collect(),
        signature: signature.to_owned(),
    })
}

/// The outcome of a successful SigV4 verification.
#[derive(Debug, Clone)]
pub struct AuthResult {
    /// The access key ID that signed the request.
    pub access_key: String,
    /// The region from the credential scope.
    pub region: String,
    /// The service from the credential scope.
    pub service: String,
    /// The headers covered by the signature.
    pub signed_headers: Vec<String>,
    /// The payload hash token the request was signed with.
    pub payload_hash: String,
    /// Everything the chunk decoder needs to continue the signature chain.
    pub chunk_context: ChunkSigningContext,
}

impl AuthResult {
    /// The verified header signature, which seeds the chunk signature chain.
    #[must_use]
    pub fn seed_signature(&self) -> &str {
        self.chunk_context.seed_signature()
    }

    /// Whether the client declared a chunk-signed streaming payload.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.payload_hash == STREAMING_PAYLOAD
    }
}

/// Verifies SigV4 header signatures against a credential store.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use bucketfs_auth::{InMemoryCredentialStore, SigV4Verifier};
///
/// let verifier = SigV4Verifier::builder()
///     .store(Arc::new(InMemoryCredentialStore::new()))
///     .max_clock_skew(Duration::from_secs(300))
///     .build();
/// assert_eq!(verifier.service(), "s3");
/// ```
#[derive(TypedBuilder)]
pub struct SigV4Verifier {
    store: Arc<dyn CredentialStore>,
    /// The only service accepted in the credential scope.
    #[builder(default = "s3".to_owned(), setter(into))]
    service: String,
    /// Maximum accepted distance between request time and server time.
    #[builder(default = DEFAULT_MAX_CLOCK_SKEW)]
    max_clock_skew: Duration,
}

impl fmt::Debug for SigV4Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigV4Verifier")
            .field("service", &self.service)
            .field("max_clock_skew", &self.max_clock_skew)
            .finish_non_exhaustive()
    }
}

impl SigV4Verifier {
    /// The service name required in credential scopes.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The configured clock skew tolerance.
    #[must_use]
    pub fn max_clock_skew(&self) -> Duration {
        self.max_clock_skew
    }

    /// Verify a request against the current server time.
    ///
    /// # Errors
    ///
    /// See [`SigV4Verifier::verify_at`].
    pub fn verify(&self, parts: &http::request::Parts) -> Result<AuthResult, AuthError> {
        self.verify_at(parts, Utc::now())
    }

    /// Verify a request as if the server clock read `now`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingAuth`] if there is no `Authorization` header
    /// - [`AuthError::MalformedAuthHeader`] if the header, its scope, the
    ///   timestamp, or a signed header is missing or invalid
    /// - [`AuthError::InvalidPath`] if the path cannot be canonicalized
    /// - [`AuthError::UnknownAccessKey`] if the access key is not in the store
    /// - [`AuthError::ClockSkew`] if the timestamp is too far from `now`
    /// - [`AuthError::SignatureMismatch`] if the signature does not match
    pub fn verify_at(
        &self,
        parts: &http::request::Parts,
        now: DateTime<Utc>,
    ) -> Result<AuthResult, AuthError> {
        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .ok_or(AuthError::MissingAuth)?
            .to_str()
            .map_err(|_| AuthError::malformed("Authorization header is not ASCII"))?;

        let parsed = parse_authorization_header(auth_header)?;
        if parsed.service != self.service {
            return Err(AuthError::malformed(format!(
                "credential scope service '{}' is not '{}'",
                parsed.service, self.service
            )));
        }

        let credential = self.store.get(&parsed.access_key).ok_or_else(|| {
            debug!(access_key = %parsed.access_key, "unknown access key");
            AuthError::UnknownAccessKey(parsed.access_key.clone())
        })?;

        let (timestamp, request_time) = request_timestamp(parts)?;
        if request_time.format(SCOPE_DATE_FORMAT).to_string() != parsed.date {
            return Err(AuthError::malformed(
                "credential scope date does not match request date",
            ));
        }

        let max_skew = TimeDelta::from_std(self.max_clock_skew).unwrap_or(TimeDelta::MAX);
        if (now - request_time).abs() > max_skew {
            debug!(%request_time, %now, "request timestamp outside clock skew window");
            return Err(AuthError::ClockSkew);
        }

        debug!(
            access_key = %parsed.access_key,
            date = %parsed.date,
            region = %parsed.region,
            service = %parsed.service,
            "verifying SigV4 signature"
        );

        let payload_hash = header_str(parts, CONTENT_SHA256_HEADER)?
            .unwrap_or(EMPTY_PAYLOAD_SHA256)
            .to_owned();

        let signed_header_refs: Vec<&str> =
            parsed.signed_headers.iter().map(String::as_str).collect();
        let header_pairs = collect_signed_headers(parts, &signed_header_refs)?;

        let canonical_request = build_canonical_request(
            parts.method.as_str(),
            parts.uri.path(),
            parts.uri.query().unwrap_or(""),
            &header_pairs,
            &signed_header_refs,
            &payload_hash,
        )?;
        debug!(canonical_request, "built canonical request");

        let scope = credential_scope(&parsed.date, &parsed.region, &parsed.service);
        let string_to_sign = build_string_to_sign(
            &timestamp,
            &scope,
            &hash_canonical_request(&canonical_request),
        );

        let signing_key = SigningKey::derive(
            credential.secret_key(),
            &parsed.date,
            &parsed.region,
            &parsed.service,
        );
        let expected_signature = signing_key.sign(&string_to_sign);

        if !signatures_match(&expected_signature, &parsed.signature) {
            debug!(access_key = %parsed.access_key, "signature mismatch");
            return Err(AuthError::SignatureMismatch);
        }

        debug!(access_key = %parsed.access_key, "signature verification succeeded");
        Ok(AuthResult {
            access_key: parsed.access_key,
            region: parsed.region,
            service: parsed.service,
            signed_headers: parsed.signed_headers,
            payload_hash,
            chunk_context: ChunkSigningContext::new(
                signing_key,
                timestamp,
                scope,
                expected_signature,
            ),
        })
    }
}

/// Resolve the request timestamp from `x-amz-date`, falling back to `date`.
///
/// Returns the timestamp in `x-amz-date` form, as used in the string to sign,
/// together with its parsed value.
fn request_timestamp(
    parts: &http::request::Parts,
) -> Result<(String, DateTime<Utc>), AuthError> {
    if let Some(value) = header_str(parts, AMZ_DATE_HEADER)? {
        let parsed = NaiveDateTime::parse_from_str(value, AMZ_DATE_FORMAT)
            .map_err(|_| AuthError::malformed("invalid x-amz-date"))?
            .and_utc();
        return Ok((value.to_owned(), parsed));
    }

    let value = header_str(parts, http::header::DATE.as_str())?
        .ok_or_else(|| AuthError::malformed("missing x-amz-date"))?;
    let parsed = DateTime::parse_from_rfc2822(value)
        .map_err(|_| AuthError::malformed("invalid Date header"))?
        .with_timezone(&Utc);
    Ok((parsed.format(AMZ_DATE_FORMAT).to_string(), parsed))
}

fn header_str<'a>(
    parts: &'a http::request::Parts,
    name: &str,
) -> Result<Option<&'a str>, AuthError> {
    parts
        .headers
        .get(name)
        .map(|v| {
            v.to_str()
                .map_err(|_| AuthError::malformed(format!("header '{name}' is not ASCII")))
        })
        .transpose()
}

/// Collect every value of each signed header as text. Absent headers are
/// reported by the canonicalizer.
fn collect_signed_headers<'a>(
    parts: &'a http::request::Parts,
    signed_headers: &[&'a str],
) -> Result<Vec<(&'a str, &'a str)>, AuthError> {
    signed_headers
        .iter()
        .flat_map(|&name| {
            parts
                .headers
                .get_all(name)
                .into_iter()
                .map(move |value| (name, value))
        })
        .map(|(name, value)| {
            value
                .to_str()
                .map(|value| (name, value))
                .map_err(|_| AuthError::malformed(format!("header '{name}' is not ASCII")))
        })
        .collect()
}
