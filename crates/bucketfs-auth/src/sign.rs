//! Client-side SigV4 signing.
//!
//! [`RequestSigner`] produces the `Authorization` header the verifier expects,
//! and [`ChunkSigner`] frames a payload as signed `aws-chunked` data continuing
//! from the header signature.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use http::HeaderValue;

use crate::canonical::{
    SIGNING_ALGORITHM, build_canonical_request, build_signed_headers_string, build_string_to_sign,
    hash_canonical_request,
};
use crate::chunked::{CHUNK_SIGNATURE_EXTENSION, ChunkSigningContext};
use crate::credentials::Credential;
use crate::error::AuthError;
use crate::signing_key::{SigningKey, credential_scope};
use crate::sigv4::{AMZ_DATE_FORMAT, AMZ_DATE_HEADER, CONTENT_SHA256_HEADER};

/// Length of a hex-encoded HMAC-SHA256 signature.
const SIGNATURE_HEX_LEN: u64 = 64;

/// Signs requests with a credential for one region and service.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credential: Credential,
    region: String,
    service: String,
}

impl RequestSigner {
    /// Create a signer.
    pub fn new(credential: Credential, region: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            credential,
            region: region.into(),
            service: service.into(),
        }
    }

    /// Sign `parts` in place.
    ///
    /// Sets `x-amz-date` and `x-amz-content-sha256`, adds `host` from the URI
    /// authority when absent, signs every header present, and inserts the
    /// `Authorization` header. Returns the context for signing chunks that
    /// follow, whose seed is the computed signature.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidPath`] if the path cannot be canonicalized,
    /// or [`AuthError::MalformedAuthHeader`] if a header value cannot be
    /// represented.
    pub fn sign(
        &self,
        parts: &mut http::request::Parts,
        payload_hash: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<ChunkSigningContext, AuthError> {
        let amz_date = timestamp.format(AMZ_DATE_FORMAT).to_string();
        let date = timestamp.format("%Y%m%d").to_string();

        parts.headers.remove(http::header::AUTHORIZATION);
        parts
            .headers
            .insert(AMZ_DATE_HEADER, header_value(&amz_date)?);
        parts
            .headers
            .insert(CONTENT_SHA256_HEADER, header_value(payload_hash)?);
        if !parts.headers.contains_key(http::header::HOST) {
            if let Some(authority) = parts.uri.authority() {
                parts
                    .headers
                    .insert(http::header::HOST, header_value(authority.as_str())?);
            }
        }

        let signed_headers: Vec<&str> = parts.headers.keys().map(http::HeaderName::as_str).collect();
        let header_pairs = parts
            .headers
            .iter()
            .map(|(name, value)| {
                value
                    .to_str()
                    .map(|v| (name.as_str(), v))
                    .map_err(|_| AuthError::malformed(format!("header '{name}' is not ASCII")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let canonical_request = build_canonical_request(
            parts.method.as_str(),
            parts.uri.path(),
            parts.uri.query().unwrap_or(""),
            &header_pairs,
            &signed_headers,
            payload_hash,
        )?;
        let scope = credential_scope(&date, &self.region, &self.service);
        let string_to_sign = build_string_to_sign(
            &amz_date,
            &scope,
            &hash_canonical_request(&canonical_request),
        );
        let signing_key = SigningKey::derive(
            self.credential.secret_key(),
            &date,
            &self.region,
            &self.service,
        );
        let signature = signing_key.sign(&string_to_sign);

        let authorization = format!(
            "{SIGNING_ALGORITHM} Credential={}/{scope}, SignedHeaders={}, Signature={signature}",
            self.credential.access_key(),
            build_signed_headers_string(&signed_headers),
        );
        let authorization = header_value(&authorization)?;
        parts
            .headers
            .insert(http::header::AUTHORIZATION, authorization);

        Ok(ChunkSigningContext::new(
            signing_key,
            amz_date,
            scope,
            signature,
        ))
    }
}

fn header_value(value: &str) -> Result<HeaderValue, AuthError> {
    HeaderValue::from_str(value)
        .map_err(|_| AuthError::malformed("value cannot be used as a header"))
}

/// Frames payload data as signed chunks, continuing a signature chain.
#[derive(Debug, Clone)]
pub struct ChunkSigner {
    context: ChunkSigningContext,
    previous_signature: String,
}

impl ChunkSigner {
    /// Start a chain at the context's seed signature.
    #[must_use]
    pub fn new(context: ChunkSigningContext) -> Self {
        let previous_signature = context.seed_signature().to_owned();
        Self {
            context,
            previous_signature,
        }
    }

    /// Sign and frame one chunk. An empty `data` produces the terminal chunk.
    pub fn encode_chunk(&mut self, data: &[u8]) -> Bytes {
        let signature = self.context.chunk_signature(&self.previous_signature, data);
        let header = format!("{:x};{CHUNK_SIGNATURE_EXTENSION}{signature}\r\n", data.len());

        let mut out = BytesMut::with_capacity(header.len() + data.len() + 2);
        out.put_slice(header.as_bytes());
        out.put_slice(data);
        out.put_slice(b"\r\n");

        self.previous_signature = signature;
        out.freeze()
    }

    /// Sign and frame the terminal zero-length chunk.
    pub fn encode_final(&mut self) -> Bytes {
        self.encode_chunk(&[])
    }

    /// Frame a whole payload in chunks of `chunk_size` bytes, terminal chunk included.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    #[must_use]
    pub fn encode_payload(context: &ChunkSigningContext, payload: &[u8], chunk_size: usize) -> Bytes {
        let mut signer = Self::new(context.clone());
        let mut out = BytesMut::with_capacity(
            usize::try_from(encoded_length(payload.len() as u64, chunk_size as u64))
                .unwrap_or(payload.len()),
        );
        for chunk in payload.chunks(chunk_size) {
            out.put(signer.encode_chunk(chunk));
        }
        out.put(signer.encode_final());
        out.freeze()
    }
}

/// Size of the framed body for a payload of `payload_len` bytes split into
/// chunks of `chunk_size`, as sent in `Content-Length`.
///
/// # Examples
///
/// ```
/// use bucketfs_auth::sign::encoded_length;
///
/// // 64 KiB + 1 KiB in 64 KiB chunks.
/// assert_eq!(encoded_length(66560, 65536), 66824);
/// ```
#[must_use]
pub fn encoded_length(payload_len: u64, chunk_size: u64) -> u64 {
    let frame = |len: u64| {
        let hex_digits = u64::from(len.checked_ilog(16).unwrap_or(0)) + 1;
        hex_digits + CHUNK_SIGNATURE_EXTENSION.len() as u64 + SIGNATURE_HEX_LEN + 2 + len + 2
    };

    let full_chunks = payload_len / chunk_size;
    let remainder = payload_len % chunk_size;
    let mut total = full_chunks * frame(chunk_size) + frame(0);
    if remainder > 0 {
        total += frame(remainder);
    }
    total
}
