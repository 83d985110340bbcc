//! Error types for SigV4 authentication.
//!
//! All authentication failures, whether raised while checking the request
//! headers or while decoding a streamed payload, are represented by
//! [`AuthError`]. Every variant is terminal for the request.
//!
//! Messages never contain secret keys or computed signatures.

/// Errors that can occur during AWS Signature Version 4 authentication.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The request carries no `Authorization` header.
    #[error("Missing Authorization header")]
    MissingAuth,

    /// The `Authorization` header, its credential scope, or a header it
    /// references is missing or malformed.
    #[error("Malformed Authorization header: {0}")]
    MalformedAuthHeader(String),

    /// The request path contains a segment that cannot be canonicalized.
    #[error("Invalid request path: {0}")]
    InvalidPath(String),

    /// The access key is not present in the credential store.
    #[error("The AWS access key ID does not exist: {0}")]
    UnknownAccessKey(String),

    /// The request timestamp is outside the accepted clock skew window.
    #[error("The difference between the request time and the server time is too large")]
    ClockSkew,

    /// The computed signature does not match the one supplied by the client.
    #[error("The request signature does not match")]
    SignatureMismatch,

    /// A chunk header line of a streamed payload could not be parsed.
    #[error("Malformed chunk header: {0}")]
    MalformedChunkHeader(String),

    /// The body ended before a chunk was complete.
    #[error("Chunk data ended before the declared length")]
    TruncatedChunk,

    /// A chunk signature does not chain from the previous signature.
    #[error("The chunk signature does not match")]
    ChunkSignatureMismatch,

    /// The decoded payload length differs from `x-amz-decoded-content-length`.
    #[error("Decoded payload length {actual} does not match declared length {expected}")]
    DecodedLengthMismatch {
        /// The length announced by the client.
        expected: u64,
        /// The number of authenticated bytes actually decoded.
        actual: u64,
    },

    /// The body's SHA-256 differs from the signed `x-amz-content-sha256` value.
    #[error("The x-amz-content-sha256 header does not match the payload")]
    PayloadHashMismatch,

    /// The underlying request body failed or timed out.
    #[error("Failed to read request body: {0}")]
    BodyRead(String),
}

impl AuthError {
    /// Shorthand for [`AuthError::MalformedAuthHeader`].
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedAuthHeader(reason.into())
    }

    /// Shorthand for [`AuthError::MalformedChunkHeader`].
    pub(crate) fn malformed_chunk(reason: impl Into<String>) -> Self {
        Self::MalformedChunkHeader(reason.into())
    }

    /// Returns `true` for failures raised while decoding a streamed payload.
    #[must_use]
    pub fn is_payload_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedChunkHeader(_)
                | Self::TruncatedChunk
                | Self::ChunkSignatureMismatch
                | Self::DecodedLengthMismatch { .. }
                | Self::PayloadHashMismatch
                | Self::BodyRead(_)
        )
    }
}
