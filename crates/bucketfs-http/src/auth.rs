//! Request authentication and body gating.
//!
//! [`authenticate`] checks the header signature before any handler runs.
//! [`gate_body`] then wraps the raw request body so that a handler only ever
//! sees payload bytes that the client's signature covers:
//!
//! - `STREAMING-AWS4-HMAC-SHA256-PAYLOAD` bodies go through the chunk decoder,
//!   which strips the framing and checks every chunk against the chain.
//! - Bodies signed with a literal SHA-256 are hashed while they stream and
//!   fail at the end on a mismatch.
//! - Anything else passes through unchanged.

use std::fmt;

use bucketfs_auth::payload::{is_sha256_hex, verify_payload_sha256};
use bucketfs_auth::sigv4::CONTENT_SHA256_HEADER;
use bucketfs_auth::{
    AuthError, AuthResult, ChunkedDecoder, ChunkedDecoderConfig, STREAMING_PAYLOAD, SigV4Verifier,
};
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tracing::debug;

use crate::error::S3Error;

/// Header carrying the payload length of a chunk-signed body.
pub const DECODED_CONTENT_LENGTH_HEADER: &str = "x-amz-decoded-content-length";

/// The request body as seen by handlers: authenticated payload bytes.
pub type RequestBody = BoxStream<'static, Result<Bytes, AuthError>>;

/// Verify the request signature when authentication is enabled.
///
/// Returns `Ok(None)` when `verifier` is `None`.
pub fn authenticate(
    parts: &http::request::Parts,
    verifier: Option<&SigV4Verifier>,
) -> Result<Option<AuthResult>, S3Error> {
    let Some(verifier) = verifier else {
        return Ok(None);
    };
    let auth = verifier.verify(parts)?;
    debug!(
        access_key = %auth.access_key,
        region = %auth.region,
        streaming = auth.is_streaming(),
        "request signature verified"
    );
    Ok(Some(auth))
}

/// Wrap `body` according to the payload hash the request declares.
///
/// # Errors
///
/// Returns `MissingContentLength` when a streaming payload lacks a valid
/// `x-amz-decoded-content-length` header.
pub fn gate_body<S, E>(
    parts: &http::request::Parts,
    auth: Option<&AuthResult>,
    body: S,
    config: &ChunkedDecoderConfig,
) -> Result<RequestBody, S3Error>
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: fmt::Display + Send + 'static,
{
    let payload_hash = match auth {
        Some(auth) => Some(auth.payload_hash.as_str()),
        None => parts
            .headers
            .get(CONTENT_SHA256_HEADER)
            .and_then(|v| v.to_str().ok()),
    };

    match payload_hash {
        Some(STREAMING_PAYLOAD) => {
            let decoded_length = parts
                .headers
                .get(DECODED_CONTENT_LENGTH_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .ok_or_else(|| S3Error::missing_content_length(DECODED_CONTENT_LENGTH_HEADER))?;
            let config = ChunkedDecoderConfig {
                decoded_content_length: Some(decoded_length),
                ..config.clone()
            };
            let decoder = match auth {
                Some(auth) => ChunkedDecoder::new(body, auth.chunk_context.clone(), config),
                None => ChunkedDecoder::unverified(body, config),
            };
            Ok(decoder.into_stream().boxed())
        }
        Some(hash) if is_sha256_hex(hash) => Ok(verify_payload_sha256(body, hash).boxed()),
        _ => Ok(body
            .map(|item| item.map_err(|err| AuthError::BodyRead(err.to_string())))
            .boxed()),
    }
}
